//! Run-level report: per-file records, summary and exit code.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::FileOutcome;
use crate::exit_codes;

/// Outcome of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Success,
    Partial,
    Failure,
    /// Empty source file; nothing was generated.
    Skipped,
    /// The file could not be processed (unreadable, unsupported language, ...).
    Errored,
    /// The test file of a deleted source was removed.
    Removed,
    /// A source was deleted but had no test file.
    NothingToRemove,
}

impl From<FileOutcome> for RecordOutcome {
    fn from(outcome: FileOutcome) -> Self {
        match outcome {
            FileOutcome::Success => Self::Success,
            FileOutcome::Partial => Self::Partial,
            FileOutcome::Failure => Self::Failure,
        }
    }
}

impl RecordOutcome {
    /// Whether this outcome should fail the run.
    pub fn is_shortfall(self) -> bool {
        matches!(self, Self::Partial | Self::Failure | Self::Errored)
    }

    fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
            Self::Errored => "error",
            Self::Removed => "removed",
            Self::NothingToRemove => "unchanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub outcome: RecordOutcome,
    pub coverage: Option<f64>,
    /// Retry cycles completed (0 when the first attempt settled it).
    pub attempts: u32,
    pub generation_calls: u32,
    pub artifact_path: Option<PathBuf>,
    /// Final feedback or error detail.
    pub feedback: Option<String>,
}

impl FileRecord {
    /// Record for a file that never reached the workflow.
    pub fn without_workflow(path: PathBuf, outcome: RecordOutcome, detail: Option<String>) -> Self {
        Self {
            path,
            outcome,
            coverage: None,
            attempts: 0,
            generation_calls: 0,
            artifact_path: None,
            feedback: detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub threshold: f64,
    pub records: Vec<FileRecord>,
}

impl RunReport {
    pub fn new(threshold: f64, records: Vec<FileRecord>) -> Self {
        Self { threshold, records }
    }

    pub fn count(&self, outcome: RecordOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    /// [`exit_codes::OK`] unless some file fell short.
    pub fn exit_code(&self) -> i32 {
        if self.records.iter().any(|r| r.outcome.is_shortfall()) {
            exit_codes::BELOW_THRESHOLD
        } else {
            exit_codes::OK
        }
    }

    /// Human-readable summary for stdout.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        if self.records.is_empty() {
            out.push_str("No files to process.\n");
            return out;
        }
        for record in &self.records {
            out.push_str(&format!("{:<9} {}", record.outcome.label(), record.path.display()));
            if let Some(coverage) = record.coverage {
                out.push_str(&format!("  coverage {coverage:.2}%"));
            }
            if record.generation_calls > 1 {
                out.push_str(&format!("  after {} attempts", record.generation_calls));
            }
            if let Some(artifact) = &record.artifact_path {
                out.push_str(&format!("  -> {}", artifact.display()));
            }
            out.push('\n');
            if record.outcome.is_shortfall() {
                if let Some(feedback) = &record.feedback {
                    out.push_str(&format!("          {feedback}\n"));
                }
            }
        }
        out.push_str(&format!(
            "\n{} files: {} met the {}% threshold, {} partial, {} failed, {} errored, {} skipped, {} removed\n",
            self.records.len(),
            self.count(RecordOutcome::Success),
            self.threshold,
            self.count(RecordOutcome::Partial),
            self.count(RecordOutcome::Failure),
            self.count(RecordOutcome::Errored),
            self.count(RecordOutcome::Skipped),
            self.count(RecordOutcome::Removed),
        ));
        out
    }

    /// Write the report as pretty JSON, replacing any existing file.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize run report")?;
        fs::write(path, format!("{json}\n")).with_context(|| format!("write {}", path.display()))
    }
}
