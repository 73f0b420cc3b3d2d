//! Prompt rendering for the test generator.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::paths::artifact_path;
use crate::core::types::GenerationState;
use crate::io::model::ModelRequest;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const INITIAL_TEMPLATE: &str = include_str!("prompts/initial.md");
const REGENERATE_TEMPLATE: &str = include_str!("prompts/regenerate.md");

/// Template engine wrapper around minijinja.
///
/// Attempt 0 renders the initial template with the raw source; later attempts
/// render the regeneration template, which quotes the previous feedback
/// verbatim.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
    framework: String,
}

impl PromptEngine {
    pub fn new(framework: impl Into<String>) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .context("load system prompt template")?;
        env.add_template("initial", INITIAL_TEMPLATE)
            .context("load initial prompt template")?;
        env.add_template("regenerate", REGENERATE_TEMPLATE)
            .context("load regenerate prompt template")?;
        Ok(Self {
            env,
            framework: framework.into(),
        })
    }

    /// Build the model request for the next generation attempt.
    pub fn render(&self, state: &GenerationState) -> Result<ModelRequest> {
        let source_name = file_name(&state.source_path);
        let artifact_name = file_name(&artifact_path(&state.source_path));

        let system = self
            .env
            .get_template("system")?
            .render(context! {
                framework => &self.framework,
                language => state.language.display_name(),
                fence => state.language.fence_tag(),
                artifact_name => artifact_name,
                source_name => source_name,
            })
            .context("render system prompt")?;

        let template = if state.attempt > 0 {
            "regenerate"
        } else {
            "initial"
        };
        let user = self
            .env
            .get_template(template)?
            .render(context! {
                framework => &self.framework,
                fence => state.language.fence_tag(),
                source_path => state.source_path.display().to_string(),
                source => state.source_content.trim_end(),
                feedback => &state.feedback,
            })
            .with_context(|| format!("render {template} prompt"))?;

        debug!(
            template,
            attempt = state.attempt,
            bytes = user.len(),
            "rendered prompt"
        );
        Ok(ModelRequest { system, user })
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
