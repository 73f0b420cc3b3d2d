//! Fenced code extraction from free-form model responses.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::language::Language;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*```\s*([A-Za-z0-9_+#.-]*)(?:\s+.*)?$").expect("fence regex should be valid")
});

/// A fenced region of a response, with the lowercased first word of its info
/// string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fence<'a> {
    tag: String,
    body: Vec<&'a str>,
}

/// Return the trimmed body of the first fenced block tagged with `language`.
///
/// Text outside fences is ignored. Blocks tagged with another language (or not
/// tagged at all) are skipped as a whole, so their closing fence is never
/// mistaken for an opening one. An unterminated or empty block yields `None`.
pub fn extract_code_block(response: &str, language: Language) -> Option<String> {
    let aliases = language.fence_aliases();
    fences(response)
        .into_iter()
        .find(|fence| aliases.contains(&fence.tag.as_str()))
        .map(|fence| fence.body.join("\n").trim().to_string())
        .filter(|code| !code.is_empty())
}

fn fences(response: &str) -> Vec<Fence<'_>> {
    let mut out = Vec::new();
    let mut open: Option<Fence<'_>> = None;

    for line in response.lines() {
        match open.take() {
            None => {
                if let Some(caps) = FENCE_RE.captures(line) {
                    open = Some(Fence {
                        tag: caps[1].to_ascii_lowercase(),
                        body: Vec::new(),
                    });
                }
            }
            Some(mut fence) => {
                if line.trim() == "```" {
                    out.push(fence);
                } else {
                    fence.body.push(line);
                    open = Some(fence);
                }
            }
        }
    }

    out
}
