//! Coverage runner adapter for Jest.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::coverage_report::{line_coverage_for, parse_report};
use crate::core::paths::artifact_path;
use crate::io::config::RunnerConfig;
use crate::io::process::{ProcessLimits, run_bounded};

/// Parameters for one coverage measurement.
#[derive(Debug, Clone, Copy)]
pub struct MeasureRequest<'a> {
    /// Source file under test, relative to the project root.
    pub source_path: &'a Path,
    /// Generated test text to persist and run.
    pub artifact: &'a str,
}

/// Abstraction over test runners that report line coverage.
pub trait CoverageRunner {
    /// Persist the artifact, run it, and return the line coverage of the source
    /// file in `[0, 100]`.
    ///
    /// A report without a matching entry (or no report at all) is `Ok(0.0)`;
    /// `Err` means the measurement itself could not be performed.
    fn measure(&self, request: &MeasureRequest<'_>) -> Result<f64>;
}

/// Per-artifact-path mutual exclusion.
///
/// Writing an artifact and running the runner against it happen under the
/// lock for that path, so concurrent workers never interleave on one file.
#[derive(Debug, Default)]
pub struct ArtifactLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ArtifactLocks {
    pub fn lock_for(&self, path: &Path) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| anyhow!("artifact lock registry poisoned"))?;
        Ok(locks.entry(path.to_path_buf()).or_default().clone())
    }
}

/// Runner that writes `<stem>.test.<ext>` next to the source and invokes
/// `<command> <artifact> --coverage --json --silent` in the project root.
pub struct JestCoverageRunner {
    root: PathBuf,
    command: Vec<String>,
    limits: ProcessLimits,
    locks: ArtifactLocks,
}

impl JestCoverageRunner {
    pub fn new(root: impl Into<PathBuf>, config: &RunnerConfig) -> Self {
        Self {
            root: root.into(),
            command: config.command.clone(),
            limits: ProcessLimits {
                timeout: Duration::from_secs(config.timeout_secs),
                output_limit_bytes: config.output_limit_bytes,
            },
            locks: ArtifactLocks::default(),
        }
    }

    fn build_command(&self, artifact_rel: &Path) -> Result<Command> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("runner command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(artifact_rel)
            .args(["--coverage", "--json", "--silent"])
            .current_dir(&self.root);
        Ok(cmd)
    }
}

impl CoverageRunner for JestCoverageRunner {
    #[instrument(skip_all, fields(source = %request.source_path.display()))]
    fn measure(&self, request: &MeasureRequest<'_>) -> Result<f64> {
        let source_abs = self.root.join(request.source_path);
        let artifact_abs = artifact_path(&source_abs);

        let lock = self.locks.lock_for(&artifact_abs)?;
        let _guard = lock
            .lock()
            .map_err(|_| anyhow!("artifact lock poisoned for {}", artifact_abs.display()))?;

        write_artifact(&artifact_abs, request.artifact)?;
        info!(artifact = %artifact_abs.display(), "test file written");

        let artifact_rel = artifact_abs
            .strip_prefix(&self.root)
            .unwrap_or(&artifact_abs)
            .to_path_buf();
        let output = run_bounded(self.build_command(&artifact_rel)?, self.limits)
            .context("run test runner")?;
        if output.timed_out {
            bail!("test runner timed out after {:?}", self.limits.timeout);
        }
        if !output.status.success() {
            debug!(
                exit_code = ?output.status.code(),
                stderr = %output.stderr_tail(2_000),
                "test runner exited with failures"
            );
        }

        let Some(report) = parse_report(&output.stdout_lossy()) else {
            warn!(exit_code = ?output.status.code(), "test runner output is not a JSON report");
            return Ok(0.0);
        };

        let source_resolved = resolve(&source_abs);
        let coverage = line_coverage_for(&report, |declared| {
            resolve(Path::new(declared)) == source_resolved
        });
        match coverage {
            Some(pct) => {
                if !output.status.success() {
                    info!(coverage = pct, "tests failed, but coverage data was extracted");
                }
                Ok(pct)
            }
            None => {
                warn!("coverage report has no entry for the source file");
                Ok(0.0)
            }
        }
    }
}

/// Overwrite the artifact; the previous content is never read.
fn write_artifact(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create artifact dir {}", parent.display()))?;
    }
    let mut buf = contents.to_string();
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    fs::write(path, buf).with_context(|| format!("write test file {}", path.display()))
}

/// Canonical absolute path, falling back to a lexical absolute path for files
/// that cannot be canonicalized.
fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
