//! Test-only fakes for the model and coverage runner seams.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::io::coverage::{CoverageRunner, MeasureRequest};
use crate::io::model::{GenerativeModel, ModelRequest};

/// Model that replays scripted responses in order.
///
/// `Err(message)` entries become transport errors. Running past the end of
/// the script is also an error, so over-calling shows up in assertions.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl GenerativeModel for ScriptedModel {
    fn complete(&self, request: &ModelRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        match self.responses.lock().expect("responses lock").pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted model exhausted")),
        }
    }
}

/// Coverage runner that replays scripted results and records each request
/// as `(source_path, artifact)`.
#[derive(Debug, Default)]
pub struct ScriptedCoverageRunner {
    results: Mutex<VecDeque<Result<f64, String>>>,
    recorded: Mutex<Vec<(PathBuf, String)>>,
}

impl ScriptedCoverageRunner {
    pub fn new(results: Vec<Result<f64, String>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<(PathBuf, String)> {
        self.recorded.lock().expect("recorded lock").clone()
    }

    pub fn calls(&self) -> usize {
        self.recorded.lock().expect("recorded lock").len()
    }
}

impl CoverageRunner for ScriptedCoverageRunner {
    fn measure(&self, request: &MeasureRequest<'_>) -> Result<f64> {
        self.recorded
            .lock()
            .expect("recorded lock")
            .push((request.source_path.to_path_buf(), request.artifact.to_string()));
        match self.results.lock().expect("results lock").pop_front() {
            Some(Ok(coverage)) => Ok(coverage),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted coverage runner exhausted")),
        }
    }
}

/// Wrap `code` in a fenced block tagged `lang`.
pub fn fenced(lang: &str, code: &str) -> String {
    format!("```{lang}\n{code}\n```")
}

/// Temporary project directory with helpers for laying out source files.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.dir.path().join(rel).exists()
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
