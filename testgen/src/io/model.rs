//! Generative model abstraction.
//!
//! The [`GenerativeModel`] trait decouples the test generator from the model
//! backend (currently the Gemini `generateContent` REST API). Tests use
//! scripted models that return predetermined responses without network access.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::io::config::{ModelConfig, ModelCredentials};

/// One request to the model: a system directive and a single user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
}

/// Abstraction over generative text backends.
pub trait GenerativeModel {
    /// Send one request and return the raw response text. Implementations must
    /// not retry internally.
    fn complete(&self, request: &ModelRequest) -> Result<String>;
}

/// Client for Google's Generative Language API.
pub struct GeminiModel {
    client: Client,
    url: String,
    api_key: String,
    temperature: f32,
}

impl GeminiModel {
    pub fn new(config: &ModelConfig, credentials: &ModelCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            url: generate_url(&config.endpoint, &config.name),
            api_key: credentials.api_key.clone(),
            temperature: config.temperature,
        })
    }
}

fn generate_url(endpoint: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn build_body(request: &ModelRequest, temperature: f32) -> GenerateRequest<'_> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: &request.system,
            }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part {
                text: &request.user,
            }],
        }],
        generation_config: GenerationConfig { temperature },
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(raw: &str) -> Result<String> {
    let parsed: GenerateResponse =
        serde_json::from_str(raw).context("parse generateContent response")?;
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("model returned no candidates"))?;
    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    if text.is_empty() {
        bail!(
            "model returned an empty candidate (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        );
    }
    Ok(text)
}

impl GenerativeModel for GeminiModel {
    #[instrument(skip_all, fields(url = %self.url))]
    fn complete(&self, request: &ModelRequest) -> Result<String> {
        let body = build_body(request, self.temperature);
        debug!(
            system_bytes = request.system.len(),
            user_bytes = request.user.len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .context("send generateContent request")?;

        let status = response.status();
        let raw = response.text().context("read generateContent response")?;
        if !status.is_success() {
            warn!(%status, "generateContent request failed");
            let snippet: String = raw.chars().take(500).collect();
            bail!("generateContent failed: HTTP {status} - {snippet}");
        }

        let text = response_text(&raw)?;
        debug!(response_bytes = text.len(), "received model response");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn url_targets_generate_content() {
        assert_eq!(
            generate_url(
                "https://generativelanguage.googleapis.com/v1beta/",
                "gemini-2.5-flash"
            ),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn body_carries_system_user_and_temperature() {
        let request = ModelRequest {
            system: "be a tester".to_string(),
            user: "write tests".to_string(),
        };
        let body: Value = serde_json::to_value(build_body(&request, 0.5)).expect("serialize");
        assert_eq!(
            body,
            json!({
                "systemInstruction": {"parts": [{"text": "be a tester"}]},
                "contents": [{"role": "user", "parts": [{"text": "write tests"}]}],
                "generationConfig": {"temperature": 0.5}
            })
        );
    }

    #[test]
    fn text_parts_of_first_candidate_are_joined() {
        let raw = r#"{"candidates":[
            {"content":{"role":"model","parts":[{"text":"```javascript\n"},{"text":"a();\n```"}]},"finishReason":"STOP"},
            {"content":{"parts":[{"text":"ignored"}]}}]}"#;
        assert_eq!(response_text(raw).expect("text"), "```javascript\na();\n```");
    }

    #[test]
    fn blocked_candidate_is_an_error() {
        let raw = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let err = response_text(raw).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn no_candidates_is_an_error() {
        let err = response_text(r#"{"promptFeedback":{"blockReason":"OTHER"}}"#).unwrap_err();
        assert!(err.to_string().contains("no candidates"));
    }
}
