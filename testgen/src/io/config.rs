//! Generator configuration stored in `testgen.toml` at the project root.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default config file name, resolved against the project root.
pub const CONFIG_FILE_NAME: &str = "testgen.toml";

/// Fatal configuration problem; the run must not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Generator configuration (TOML).
///
/// Missing fields default to the values below. The config is loaded once at
/// process start and never mutated during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TestgenConfig {
    /// Minimum acceptable line coverage percentage.
    pub coverage_threshold: f64,

    /// Maximum number of regenerations after the first attempt.
    pub max_regeneration_attempts: u32,

    /// Testing framework named in prompts.
    pub testing_framework: String,

    /// File extensions eligible for test generation.
    pub supported_extensions: Vec<String>,

    /// Glob patterns (relative to the project root) excluded from generation.
    pub ignore_patterns: Vec<String>,

    /// Number of files processed concurrently.
    pub jobs: usize,

    pub model: ModelConfig,

    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier, e.g. `gemini-2.5-flash`.
    pub name: String,

    /// Base URL of the Generative Language API.
    pub endpoint: String,

    pub temperature: f32,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Test runner command; the artifact path and coverage flags are appended.
    pub command: Vec<String>,

    /// Wall-clock limit for one runner invocation.
    pub timeout_secs: u64,

    /// Bytes of runner stdout/stderr kept in memory.
    pub output_limit_bytes: usize,
}

impl Default for TestgenConfig {
    fn default() -> Self {
        Self {
            coverage_threshold: 80.0,
            max_regeneration_attempts: 3,
            testing_framework: "Jest".to_string(),
            supported_extensions: vec![".js".to_string(), ".ts".to_string()],
            ignore_patterns: [
                "node_modules/**",
                "**/*.test.*",
                "**/*.spec.*",
                "jest.config.js",
                "coverage/**",
                "target/**",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            jobs: 1,
            model: ModelConfig::default(),
            runner: RunnerConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.4,
            api_key_env: "GEMINI_API_KEY".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: vec!["npx".to_string(), "jest".to_string()],
            timeout_secs: 5 * 60,
            output_limit_bytes: 20_000_000,
        }
    }
}

/// Command-line overrides applied on top of the file config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub coverage_threshold: Option<f64>,
    pub max_regeneration_attempts: Option<u32>,
    pub jobs: Option<usize>,
}

impl TestgenConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.coverage_threshold) {
            return Err(ConfigError::new(format!(
                "coverage_threshold must be within 0..=100 (got {})",
                self.coverage_threshold
            )));
        }
        if self.jobs == 0 {
            return Err(ConfigError::new("jobs must be > 0"));
        }
        if self.supported_extensions.is_empty() {
            return Err(ConfigError::new("supported_extensions must not be empty"));
        }
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::new("model.name must not be empty"));
        }
        if self.model.api_key_env.trim().is_empty() {
            return Err(ConfigError::new("model.api_key_env must not be empty"));
        }
        if self.model.request_timeout_secs == 0 {
            return Err(ConfigError::new("model.request_timeout_secs must be > 0"));
        }
        if self.runner.command.is_empty() || self.runner.command[0].trim().is_empty() {
            return Err(ConfigError::new("runner.command must be a non-empty array"));
        }
        if self.runner.timeout_secs == 0 {
            return Err(ConfigError::new("runner.timeout_secs must be > 0"));
        }
        if self.runner.output_limit_bytes == 0 {
            return Err(ConfigError::new("runner.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    /// Apply CLI overrides and re-validate.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(threshold) = overrides.coverage_threshold {
            self.coverage_threshold = threshold;
        }
        if let Some(max) = overrides.max_regeneration_attempts {
            self.max_regeneration_attempts = max;
        }
        if let Some(jobs) = overrides.jobs {
            self.jobs = jobs;
        }
        self.validate()?;
        Ok(self)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TestgenConfig::default()`.
pub fn load_config(path: &Path) -> Result<TestgenConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using defaults");
        let cfg = TestgenConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TestgenConfig = toml::from_str(&contents)
        .map_err(|err| ConfigError::new(format!("parse {}: {err}", path.display())))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &TestgenConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

/// Credentials for the generative model.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelCredentials {
    pub api_key: String,
}

impl fmt::Debug for ModelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCredentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Load `<root>/.env` into the process environment without overriding
/// variables that are already set. A missing file is not an error.
pub fn load_dotenv(root: &Path) -> Result<()> {
    let path = root.join(".env");
    if !path.exists() {
        return Ok(());
    }
    dotenvy::from_path(&path).with_context(|| format!("load {}", path.display()))?;
    debug!(path = %path.display(), "loaded environment file");
    Ok(())
}

/// Resolve the API key through `lookup` (normally `std::env::var`).
pub fn resolve_credentials<F>(model: &ModelConfig, lookup: F) -> Result<ModelCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = lookup(&model.api_key_env)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ConfigError::new(format!(
                "{} is not set (add it to the environment or a .env file)",
                model.api_key_env
            ))
        })?;
    Ok(ModelCredentials { api_key })
}
