//! Eligibility rules for source files.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Decides which project files enter the generation workflow.
///
/// Paths are matched relative to the project root with `/` separators.
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: BTreeSet<String>,
    ignore: GlobSet,
}

impl FileFilter {
    /// Build a filter from extensions (with or without the leading dot) and
    /// glob ignore patterns.
    pub fn new<E, P>(extensions: E, ignore_patterns: P) -> Result<Self>
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        let mut builder = GlobSetBuilder::new();
        for pattern in ignore_patterns {
            let pattern = pattern.as_ref();
            let glob =
                Glob::new(pattern).with_context(|| format!("invalid ignore pattern '{pattern}'"))?;
            builder.add(glob);
        }
        let ignore = builder.build().context("build ignore patterns")?;

        Ok(Self { extensions, ignore })
    }

    pub fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.is_match(normalize(path))
    }

    /// True when `path` should get a generated test.
    pub fn is_eligible(&self, path: &Path) -> bool {
        self.has_supported_extension(path) && !self.is_ignored(path)
    }

    /// True when a directory can be skipped entirely during a scan, i.e. an
    /// arbitrary file directly inside it is already ignored.
    pub fn prunes_dir(&self, dir: &Path) -> bool {
        if dir.as_os_str().is_empty() {
            return false;
        }
        self.ignore.is_match(format!("{}/__testgen_probe__", normalize(dir)))
    }
}

fn normalize(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    text.strip_prefix("./").map(str::to_string).unwrap_or(text)
}
