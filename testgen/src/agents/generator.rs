//! Test generator agent.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::extract::extract_code_block;
use crate::core::types::{GenerationDelta, GenerationState, NO_CODE_BLOCK_FEEDBACK};
use crate::io::model::GenerativeModel;
use crate::io::prompt::PromptEngine;

/// Generator wrapper that owns prompt settings.
#[derive(Debug)]
pub struct TestGenerator {
    prompts: PromptEngine,
}

impl TestGenerator {
    pub fn new(framework: impl Into<String>) -> Result<Self> {
        Ok(Self {
            prompts: PromptEngine::new(framework)?,
        })
    }

    /// Ask `model` for a test file for the snapshot's source.
    ///
    /// Issues exactly one model request. Every failure (prompt rendering,
    /// transport, missing code block) is reported as an absent artifact with
    /// descriptive feedback rather than an error.
    #[instrument(skip_all, fields(source = %state.source_path.display(), attempt = state.attempt))]
    pub fn generate<M: GenerativeModel>(&self, model: &M, state: &GenerationState) -> GenerationDelta {
        info!("generating tests");
        let request = match self.prompts.render(state) {
            Ok(request) => request,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "prompt rendering failed");
                return GenerationDelta::failed(format!("Prompt rendering failed: {err:#}"));
            }
        };

        let response = match model.complete(&request) {
            Ok(response) => response,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "model request failed");
                return GenerationDelta::failed(format!("LLM request failed: {err:#}"));
            }
        };

        match extract_code_block(&response, state.language) {
            Some(code) => {
                debug!(bytes = code.len(), "extracted test code");
                GenerationDelta::produced(code)
            }
            None => {
                warn!(
                    response_bytes = response.len(),
                    "generator failed to produce a valid code block"
                );
                GenerationDelta::failed(NO_CODE_BLOCK_FEEDBACK)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::language::Language;
    use crate::test_support::{ScriptedModel, fenced};
    use std::path::PathBuf;

    fn state() -> GenerationState {
        GenerationState::new(
            PathBuf::from("calculator.js"),
            "exports.add = (a, b) => a + b;".to_string(),
            Language::JavaScript,
        )
    }

    #[test]
    fn produces_artifact_from_fenced_response() {
        let model = ScriptedModel::new(vec![Ok(format!(
            "Sure!\n{}\nThat should do it.",
            fenced("javascript", "test('add', () => {});")
        ))]);
        let generator = TestGenerator::new("Jest").expect("generator");

        let delta = generator.generate(&model, &state());

        assert_eq!(
            delta,
            GenerationDelta::produced("test('add', () => {});".to_string())
        );
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn missing_block_yields_fixed_feedback() {
        let model = ScriptedModel::new(vec![Ok("I'd rather not.".to_string())]);
        let generator = TestGenerator::new("Jest").expect("generator");

        let delta = generator.generate(&model, &state());

        assert_eq!(delta, GenerationDelta::failed(NO_CODE_BLOCK_FEEDBACK));
    }

    #[test]
    fn transport_error_is_contained() {
        let model = ScriptedModel::new(vec![Err("connection reset".to_string())]);
        let generator = TestGenerator::new("Jest").expect("generator");

        let delta = generator.generate(&model, &state());

        assert!(delta.candidate_artifact.is_none());
        let feedback = delta.feedback.expect("feedback");
        assert!(feedback.starts_with("LLM request failed"));
        assert!(feedback.contains("connection reset"));
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn retry_request_carries_feedback() {
        let model = ScriptedModel::new(vec![Ok(fenced("javascript", "it('x', () => {});"))]);
        let generator = TestGenerator::new("Jest").expect("generator");
        let mut state = state();
        state.attempt = 2;
        state.feedback = "cover the negative branch".to_string();

        generator.generate(&model, &state);

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].user.contains("\"cover the negative branch\""));
    }
}
