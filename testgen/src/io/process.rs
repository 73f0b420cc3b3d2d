//! Helpers for running child processes with timeouts and bounded output.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Limits applied to a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLimits {
    pub timeout: Duration,
    /// Bytes of stdout and of stderr kept in memory; the rest is drained and
    /// counted but discarded.
    pub output_limit_bytes: usize,
}

/// Captured child process output.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_dropped: usize,
    pub stderr_dropped: usize,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Last `max_bytes` of stderr, for diagnostics.
    pub fn stderr_tail(&self, max_bytes: usize) -> String {
        let start = self.stderr.len().saturating_sub(max_bytes);
        String::from_utf8_lossy(&self.stderr[start..]).trim().to_string()
    }
}

/// How long reader threads may keep running after a timeout kill.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Run `cmd` to completion (or until the timeout kills it), with stdin closed.
///
/// Both pipes are drained on dedicated threads while the child runs so a chatty
/// child can never block on a full pipe. On Unix the child leads its own
/// process group and a timeout kills the whole group, so wrappers such as
/// `npx` cannot leave grandchildren holding the pipes open.
#[instrument(skip_all, fields(timeout_secs = limits.timeout.as_secs()))]
pub fn run_bounded(mut cmd: Command, limits: ProcessLimits) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!(program = ?cmd.get_program(), "spawning child process");
    let mut child = cmd.spawn().map_err(|err| {
        error!(err = %err, program = ?cmd.get_program(), "failed to spawn command");
        anyhow!(err).context(format!("spawn {:?}", cmd.get_program()))
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let limit = limits.output_limit_bytes;
    let stdout_reader = thread::spawn(move || drain_limited(stdout, limit));
    let stderr_reader = thread::spawn(move || drain_limited(stderr, limit));

    let (status, timed_out) = match child
        .wait_timeout(limits.timeout)
        .context("wait for command")?
    {
        Some(status) => (status, false),
        None => {
            warn!(
                timeout_secs = limits.timeout.as_secs(),
                "command timed out, killing"
            );
            kill_process_group(child.id());
            child.kill().context("kill command")?;
            (child.wait().context("wait command after kill")?, true)
        }
    };

    let (stdout_reader, stderr_reader) = if timed_out {
        // Descendants that escaped the group may still hold the pipes.
        (
            abandon_if_stuck(stdout_reader, "stdout"),
            abandon_if_stuck(stderr_reader, "stderr"),
        )
    } else {
        (Some(stdout_reader), Some(stderr_reader))
    };
    let (stdout, stdout_dropped) = join_reader(stdout_reader).context("join stdout")?;
    let (stderr, stderr_dropped) = join_reader(stderr_reader).context("join stderr")?;

    if stdout_dropped > 0 || stderr_dropped > 0 {
        warn!(stdout_dropped, stderr_dropped, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        stdout_dropped,
        stderr_dropped,
        timed_out,
    })
}

type Reader = thread::JoinHandle<Result<(Vec<u8>, usize)>>;

/// Kill every process in the group led by `pid`. Best effort: the direct
/// child is killed separately either way.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let result = Command::new("kill")
        .args(["-KILL", "--", &format!("-{pid}")])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match result {
        Ok(status) if status.success() => debug!(pgid = pid, "killed process group"),
        Ok(status) => warn!(pgid = pid, exit_code = ?status.code(), "kill of process group failed"),
        Err(err) => warn!(pgid = pid, %err, "could not run kill for process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

/// Wait up to [`DRAIN_GRACE`] for a reader to finish; detach it otherwise.
fn abandon_if_stuck(handle: Reader, stream: &str) -> Option<Reader> {
    let deadline = Instant::now() + DRAIN_GRACE;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(stream, "output pipe still open after kill, discarding output");
            return None;
        }
        thread::sleep(Duration::from_millis(10));
    }
    Some(handle)
}

fn join_reader(handle: Option<Reader>) -> Result<(Vec<u8>, usize)> {
    match handle {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(anyhow!("output reader thread panicked"))),
        None => Ok((Vec::new(), 0)),
    }
}

fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len()).min(n);
        kept.extend_from_slice(&chunk[..room]);
        dropped += n - room;
    }

    Ok((kept, dropped))
}
