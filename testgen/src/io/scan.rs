//! Project scan for backfill runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use crate::core::filter::FileFilter;

/// Eligible source files under `root`, relative to it, in sorted order.
///
/// Hidden directories (such as `.git`) and directories the filter fully
/// ignores are not descended into.
pub fn discover_sources(root: &Path, filter: &FileFilter) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            !hidden && !filter.prunes_dir(rel)
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("scan {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        if filter.is_eligible(rel) {
            found.push(rel.to_path_buf());
        }
    }

    debug!(count = found.len(), "discovered source files");
    Ok(found)
}
