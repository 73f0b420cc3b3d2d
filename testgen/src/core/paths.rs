//! Test artifact naming.

use std::path::{Path, PathBuf};

/// Marker inserted between a source file's stem and its extension.
pub const TEST_MARKER: &str = "test";

/// Location of the generated test for `source`: same directory, stem suffixed
/// with `.test`, same extension (`src/sum.js` -> `src/sum.test.js`).
pub fn artifact_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match source.extension() {
        Some(ext) => format!("{stem}.{TEST_MARKER}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{TEST_MARKER}"),
    };
    source.with_file_name(name)
}
