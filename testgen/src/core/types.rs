//! Shared deterministic types for the generation workflow.
//!
//! These types define stable contracts between the workflow components. They
//! do not depend on external state or I/O.

use std::path::PathBuf;

use serde::Serialize;

use crate::core::language::Language;

/// Feedback carried into the first generation attempt.
pub const INITIAL_FEEDBACK: &str = "Initial test generation.";

/// Feedback recorded when the generator response had no usable code block.
pub const NO_CODE_BLOCK_FEEDBACK: &str = "LLM did not return a valid code block.";

/// Feedback recorded when the coverage runner could not produce a measurement.
pub const MEASUREMENT_FAILURE_FEEDBACK: &str = "An error occurred while running the tests. \
The generated tests might be invalid or have syntax errors.";

/// Iteration state for a single source file.
///
/// Owned by the workflow; components only ever see `&GenerationState` and
/// return deltas that the workflow merges.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationState {
    /// Path of the code under test, relative to the project root.
    pub source_path: PathBuf,
    /// Full text of the code under test.
    pub source_content: String,
    pub language: Language,
    /// Most recently generated test text, `None` when generation failed.
    pub candidate_artifact: Option<String>,
    /// Line coverage in `[0, 100]`, 0 when unmeasured or failed.
    pub coverage: f64,
    /// Guidance for the next generation attempt.
    pub feedback: String,
    /// Completed retry cycles. Never exceeds the configured maximum.
    pub attempt: u32,
}

impl GenerationState {
    pub fn new(source_path: PathBuf, source_content: String, language: Language) -> Self {
        Self {
            source_path,
            source_content,
            language,
            candidate_artifact: None,
            coverage: 0.0,
            feedback: INITIAL_FEEDBACK.to_string(),
            attempt: 0,
        }
    }

    /// Merge the generator's result. Feedback only changes when the generator
    /// reports a failure.
    pub fn apply_generation(&mut self, delta: GenerationDelta) {
        self.candidate_artifact = delta.candidate_artifact;
        if let Some(feedback) = delta.feedback {
            self.feedback = feedback;
        }
    }
}

/// Result of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationDelta {
    pub candidate_artifact: Option<String>,
    pub feedback: Option<String>,
}

impl GenerationDelta {
    pub fn produced(artifact: String) -> Self {
        Self {
            candidate_artifact: Some(artifact),
            feedback: None,
        }
    }

    pub fn failed(feedback: impl Into<String>) -> Self {
        Self {
            candidate_artifact: None,
            feedback: Some(feedback.into()),
        }
    }
}

/// Router verdict after a cycle has been evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry,
    Done,
}

/// Workflow phases. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Generating,
    Measuring,
    /// `measured` is false when the coverage runner failed; the diagnostic
    /// feedback is then kept instead of the evaluator's message.
    Evaluating {
        measured: bool,
    },
    Retry,
    Done,
}

/// User-visible result of a finished workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    /// Artifact produced and coverage meets the threshold.
    Success,
    /// Artifact produced but coverage stayed below the threshold.
    Partial,
    /// No usable artifact.
    Failure,
}

impl FileOutcome {
    pub fn classify(state: &GenerationState, threshold: f64) -> Self {
        match state.candidate_artifact {
            None => Self::Failure,
            Some(_) if state.coverage >= threshold => Self::Success,
            Some(_) => Self::Partial,
        }
    }
}

/// Change kind reported by the change-detection collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
}

/// A file changed between two revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: PathBuf,
    pub status: ChangeStatus,
}
