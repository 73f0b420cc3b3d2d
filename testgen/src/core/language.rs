//! Source languages the generator knows how to prompt for.

use std::path::Path;

use serde::Serialize;

/// Language of a source file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
}

impl Language {
    /// Detect the language from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "tsx" | "mts" | "cts" => Some(Self::TypeScript),
            _ => None,
        }
    }

    /// Human-readable name used in prompt text.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
        }
    }

    /// Canonical info string for fenced code blocks.
    pub fn fence_tag(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
        }
    }

    /// Every info string accepted as "tagged with this language".
    pub fn fence_aliases(self) -> &'static [&'static str] {
        match self {
            Self::JavaScript => &["javascript", "js", "jsx"],
            Self::TypeScript => &["typescript", "ts", "tsx"],
        }
    }
}
