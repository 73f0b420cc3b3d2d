//! Run driver: plan work items and process them into a [`RunReport`].
//!
//! Planning turns a CLI mode (backfill, incremental, explicit files) into an
//! ordered list of [`WorkItem`]s. Execution runs the per-file workflow for each
//! item, either sequentially or on a bounded pool of scoped threads.

use std::fs;
use std::io::ErrorKind;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::agents::generator::TestGenerator;
use crate::core::filter::FileFilter;
use crate::core::language::Language;
use crate::core::paths::artifact_path;
use crate::core::types::{ChangeStatus, FileOutcome};
use crate::io::coverage::CoverageRunner;
use crate::io::git::Git;
use crate::io::model::GenerativeModel;
use crate::io::scan::discover_sources;
use crate::report::{FileRecord, RecordOutcome, RunReport};
use crate::workflow::{WorkflowSettings, run_workflow};

/// One unit of work, with paths relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// Generate tests for a source file.
    Generate(PathBuf),
    /// The source was deleted; remove its test file if present.
    Remove(PathBuf),
}

impl WorkItem {
    pub fn path(&self) -> &Path {
        match self {
            Self::Generate(path) | Self::Remove(path) => path,
        }
    }
}

/// Every eligible source file under `root`.
pub fn plan_backfill(root: &Path, filter: &FileFilter) -> Result<Vec<WorkItem>> {
    let sources = discover_sources(root, filter)?;
    info!(count = sources.len(), "backfill planned");
    Ok(sources.into_iter().map(WorkItem::Generate).collect())
}

/// Eligible files changed between two revisions. Deleted sources become
/// [`WorkItem::Remove`].
pub fn plan_incremental(git: &Git, from: &str, to: &str, filter: &FileFilter) -> Result<Vec<WorkItem>> {
    let changed = git
        .changed_files(from, to)
        .with_context(|| format!("detect changes between {from} and {to}"))?;
    let items: Vec<WorkItem> = changed
        .into_iter()
        .filter(|file| filter.is_eligible(&file.path))
        .map(|file| match file.status {
            ChangeStatus::Added | ChangeStatus::Modified => WorkItem::Generate(file.path),
            ChangeStatus::Deleted => WorkItem::Remove(file.path),
        })
        .collect();
    info!(count = items.len(), from, to, "incremental run planned");
    Ok(items)
}

/// Explicitly named files, made relative to `root` where possible.
///
/// Ineligible files are dropped with a warning; duplicates keep their first
/// position.
pub fn plan_files(root: &Path, paths: &[PathBuf], filter: &FileFilter) -> Vec<WorkItem> {
    let mut items: Vec<WorkItem> = Vec::new();
    for path in paths {
        let rel = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        if !filter.is_eligible(&rel) {
            warn!(path = %rel.display(), "skipping ineligible file");
            continue;
        }
        let item = WorkItem::Generate(rel);
        if !items.contains(&item) {
            items.push(item);
        }
    }
    items
}

/// Shared collaborators for processing work items.
pub struct RunContext<'a, M, R> {
    pub root: &'a Path,
    pub generator: &'a TestGenerator,
    pub model: &'a M,
    pub runner: &'a R,
    pub settings: WorkflowSettings,
}

/// Process `items` and collect one record per item, in input order.
///
/// With `jobs > 1` items are pulled by up to `jobs` scoped worker threads.
pub fn execute<M, R>(ctx: &RunContext<'_, M, R>, items: &[WorkItem], jobs: usize) -> RunReport
where
    M: GenerativeModel + Sync,
    R: CoverageRunner + Sync,
{
    let workers = jobs.clamp(1, items.len().max(1));
    let records = if workers == 1 {
        items.iter().map(|item| process_item(ctx, item)).collect()
    } else {
        execute_parallel(ctx, items, workers)
    };
    RunReport::new(ctx.settings.threshold, records)
}

fn execute_parallel<M, R>(ctx: &RunContext<'_, M, R>, items: &[WorkItem], workers: usize) -> Vec<FileRecord>
where
    M: GenerativeModel + Sync,
    R: CoverageRunner + Sync,
{
    debug!(workers, items = items.len(), "processing in parallel");
    let next = AtomicUsize::new(0);
    let done: Mutex<Vec<(usize, FileRecord)>> = Mutex::new(Vec::with_capacity(items.len()));

    let (next, done_ref) = (&next, &done);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(move |_| {
                scope.spawn(move || {
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(item) = items.get(index) else {
                            break;
                        };
                        let record = process_item(ctx, item);
                        done_ref
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .push((index, record));
                    }
                })
            })
            .collect();
        for handle in handles {
            if let Err(payload) = handle.join() {
                panic::resume_unwind(payload);
            }
        }
    });

    let mut done = done.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
    done.sort_by_key(|(index, _)| *index);
    done.into_iter().map(|(_, record)| record).collect()
}

/// Process one item. Failures are contained in the returned record.
pub fn process_item<M: GenerativeModel, R: CoverageRunner>(
    ctx: &RunContext<'_, M, R>,
    item: &WorkItem,
) -> FileRecord {
    match item {
        WorkItem::Generate(path) => generate_for(ctx, path),
        WorkItem::Remove(path) => remove_artifact_for(ctx.root, path),
    }
}

fn generate_for<M: GenerativeModel, R: CoverageRunner>(ctx: &RunContext<'_, M, R>, path: &Path) -> FileRecord {
    let Some(language) = Language::from_path(path) else {
        warn!(path = %path.display(), "unsupported file type");
        return FileRecord::without_workflow(
            path.to_path_buf(),
            RecordOutcome::Errored,
            Some("unsupported file type".to_string()),
        );
    };

    let content = match fs::read_to_string(ctx.root.join(path)) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read source");
            return FileRecord::without_workflow(
                path.to_path_buf(),
                RecordOutcome::Errored,
                Some(format!("could not read source: {err}")),
            );
        }
    };
    if content.trim().is_empty() {
        info!(path = %path.display(), "skipping empty source");
        return FileRecord::without_workflow(path.to_path_buf(), RecordOutcome::Skipped, None);
    }

    let outcome = run_workflow(
        ctx.generator,
        ctx.model,
        ctx.runner,
        ctx.settings,
        path.to_path_buf(),
        content,
        language,
    );
    let state = &outcome.state;
    let file_outcome = FileOutcome::classify(state, ctx.settings.threshold);
    FileRecord {
        path: path.to_path_buf(),
        outcome: file_outcome.into(),
        coverage: Some(state.coverage),
        attempts: state.attempt,
        generation_calls: outcome.generation_calls,
        artifact_path: state
            .candidate_artifact
            .as_ref()
            .map(|_| artifact_path(path)),
        feedback: Some(state.feedback.clone()),
    }
}

fn remove_artifact_for(root: &Path, source: &Path) -> FileRecord {
    let artifact = artifact_path(source);
    match fs::remove_file(root.join(&artifact)) {
        Ok(()) => {
            info!(artifact = %artifact.display(), "removed test file of deleted source");
            FileRecord {
                artifact_path: Some(artifact),
                ..FileRecord::without_workflow(source.to_path_buf(), RecordOutcome::Removed, None)
            }
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(artifact = %artifact.display(), "no test file to remove");
            FileRecord::without_workflow(source.to_path_buf(), RecordOutcome::NothingToRemove, None)
        }
        Err(err) => {
            warn!(artifact = %artifact.display(), %err, "could not remove test file");
            FileRecord::without_workflow(
                source.to_path_buf(),
                RecordOutcome::Errored,
                Some(format!("could not remove {}: {err}", artifact.display())),
            )
        }
    }
}
