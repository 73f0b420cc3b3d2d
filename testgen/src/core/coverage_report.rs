//! Parsing of the test runner's JSON coverage report.
//!
//! Jest's `--json --coverage` output carries a `coverageMap` keyed by absolute
//! file path. Entries are either Istanbul summaries (with `lines.pct`) or raw
//! Istanbul file coverage (`statementMap` + `s` hit counts), optionally
//! wrapped in a `data` object. Both shapes are supported.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// Top-level runner report. Only the coverage map is read.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerReport {
    #[serde(rename = "coverageMap", default)]
    pub coverage_map: Option<BTreeMap<String, CoverageEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CoverageEntry {
    Wrapped { data: FileCoverage },
    Plain(FileCoverage),
}

impl CoverageEntry {
    pub fn file(&self) -> &FileCoverage {
        match self {
            Self::Wrapped { data } => data,
            Self::Plain(file) => file,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileCoverage {
    /// Absolute path of the covered source file.
    pub path: String,
    #[serde(default)]
    pub lines: Option<LineSummary>,
    #[serde(rename = "statementMap", default)]
    pub statement_map: BTreeMap<String, StatementLocation>,
    #[serde(default)]
    pub s: BTreeMap<String, u64>,
}

/// Istanbul summary block; `pct` is a number or the string `"Unknown"`.
#[derive(Debug, Clone, Deserialize)]
pub struct LineSummary {
    #[serde(default)]
    pub pct: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementLocation {
    pub start: Position,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    pub line: u64,
}

impl FileCoverage {
    /// Line coverage percentage in `[0, 100]`.
    ///
    /// Prefers the summary value. Otherwise a line counts as covered when any
    /// statement starting on it was hit; a file with no statements is fully
    /// covered.
    pub fn line_pct(&self) -> Option<f64> {
        if let Some(pct) = self.lines.as_ref().and_then(|summary| summary.pct.as_f64()) {
            return clamp_pct(pct);
        }

        let mut lines: BTreeMap<u64, bool> = BTreeMap::new();
        for (id, location) in &self.statement_map {
            let hit = self.s.get(id).copied().unwrap_or(0) > 0;
            let covered = lines.entry(location.start.line).or_insert(false);
            *covered |= hit;
        }
        if lines.is_empty() {
            return Some(100.0);
        }
        let covered = lines.values().filter(|hit| **hit).count();
        clamp_pct(covered as f64 / lines.len() as f64 * 100.0)
    }
}

fn clamp_pct(pct: f64) -> Option<f64> {
    if pct.is_nan() {
        return None;
    }
    Some(pct.clamp(0.0, 100.0))
}

/// Parse runner stdout into a report.
///
/// Falls back to the outermost `{...}` span when the runner printed noise
/// around the JSON document.
pub fn parse_report(stdout: &str) -> Option<RunnerReport> {
    if let Ok(report) = serde_json::from_str(stdout.trim()) {
        return Some(report);
    }
    let start = stdout.find('{')?;
    let end = stdout.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&stdout[start..=end]).ok()
}

/// Line coverage of the first entry whose declared path satisfies `is_source`.
pub fn line_coverage_for<F>(report: &RunnerReport, is_source: F) -> Option<f64>
where
    F: Fn(&str) -> bool,
{
    report
        .coverage_map
        .as_ref()?
        .values()
        .map(CoverageEntry::file)
        .find(|file| is_source(&file.path))
        .and_then(FileCoverage::line_pct)
}
