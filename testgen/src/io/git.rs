//! Git adapter for change detection.
//!
//! Incremental runs only need `git diff --name-status` between two revisions,
//! so we keep a small, explicit wrapper around `git` subprocess calls.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::types::{ChangeStatus, ChangedFile};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Files added, modified or deleted between two revisions.
    ///
    /// Limited to the working directory, with paths relative to it even when
    /// it is a subdirectory of the repository. Renames are reported as a
    /// deletion of the old path plus an addition of the new one; copies as an
    /// addition of the new path.
    #[instrument(skip_all, fields(from, to))]
    pub fn changed_files(&self, from: &str, to: &str) -> Result<Vec<ChangedFile>> {
        debug!(from, to, "checking git diff");
        let out = self.run_capture(&["diff", "--name-status", "--relative", from, to])?;
        let mut files = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_name_status_line(line) {
                Some(entries) => files.extend(entries),
                None => warn!(line, "skipping unrecognized diff entry"),
            }
        }
        debug!(count = files.len(), "changed files");
        Ok(files)
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Parse one `git diff --name-status` line (`<code>\t<path>[\t<path>]`).
///
/// Returns `None` for codes with no file-level meaning here (e.g. `U`, `X`).
fn parse_name_status_line(line: &str) -> Option<Vec<ChangedFile>> {
    let mut fields = line.split('\t');
    let code = fields.next()?.trim();
    let first = fields.next().map(str::trim).filter(|p| !p.is_empty())?;
    let second = fields.next().map(str::trim).filter(|p| !p.is_empty());

    let entry = |path: &str, status| ChangedFile {
        path: PathBuf::from(path),
        status,
    };

    match code.chars().next()? {
        'A' => Some(vec![entry(first, ChangeStatus::Added)]),
        'M' | 'T' => Some(vec![entry(first, ChangeStatus::Modified)]),
        'D' => Some(vec![entry(first, ChangeStatus::Deleted)]),
        'R' => Some(vec![
            entry(first, ChangeStatus::Deleted),
            entry(second?, ChangeStatus::Added),
        ]),
        'C' => Some(vec![entry(second?, ChangeStatus::Added)]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> Vec<(String, ChangeStatus)> {
        parse_name_status_line(line)
            .expect("parse")
            .into_iter()
            .map(|f| (f.path.display().to_string(), f.status))
            .collect()
    }

    #[test]
    fn parses_basic_statuses() {
        assert_eq!(
            parsed("A\tsrc/new.js"),
            vec![("src/new.js".to_string(), ChangeStatus::Added)]
        );
        assert_eq!(
            parsed("M\tsrc/app.js"),
            vec![("src/app.js".to_string(), ChangeStatus::Modified)]
        );
        assert_eq!(
            parsed("D\tsrc/old.js"),
            vec![("src/old.js".to_string(), ChangeStatus::Deleted)]
        );
        assert_eq!(
            parsed("T\tsrc/link.js"),
            vec![("src/link.js".to_string(), ChangeStatus::Modified)]
        );
    }

    #[test]
    fn rename_becomes_delete_plus_add() {
        assert_eq!(
            parsed("R087\tsrc/a.js\tsrc/b.js"),
            vec![
                ("src/a.js".to_string(), ChangeStatus::Deleted),
                ("src/b.js".to_string(), ChangeStatus::Added),
            ]
        );
    }

    #[test]
    fn copy_adds_destination_only() {
        assert_eq!(
            parsed("C100\tsrc/a.js\tsrc/a-copy.js"),
            vec![("src/a-copy.js".to_string(), ChangeStatus::Added)]
        );
    }

    #[test]
    fn unknown_or_malformed_lines_are_skipped() {
        assert!(parse_name_status_line("U\tsrc/conflict.js").is_none());
        assert!(parse_name_status_line("M").is_none());
        assert!(parse_name_status_line("R100\tonly-one.js").is_none());
    }
}
