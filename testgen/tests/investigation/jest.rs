//! Investigation tests for the Jest coverage runner.
//!
//! # Prerequisites
//!
//! - Node.js with `npx` in PATH (Jest is fetched by `npx` on first use)
//!
//! # Running
//!
//! ```bash
//! cargo test --test investigation_llm jest -- --ignored
//! ```

use std::path::Path;

use testgen::io::config::RunnerConfig;
use testgen::io::coverage::{CoverageRunner, JestCoverageRunner, MeasureRequest};
use testgen::test_support::TestProject;

const SOURCE: &str = "function sign(x) {\n  if (x > 0) {\n    return 1;\n  }\n  return -1;\n}\nmodule.exports = { sign };\n";

fn project() -> TestProject {
    let project = TestProject::new();
    project.write("package.json", "{\"name\": \"probe\", \"private\": true}\n");
    project.write("sign.js", SOURCE);
    project
}

/// Full coverage when every branch is exercised.
#[test]
#[ignore]
fn jest_reports_full_line_coverage() {
    let project = project();
    let runner = JestCoverageRunner::new(project.root(), &RunnerConfig::default());

    let coverage = runner
        .measure(&MeasureRequest {
            source_path: Path::new("sign.js"),
            artifact: "const { sign } = require('./sign');\ntest('pos', () => expect(sign(2)).toBe(1));\ntest('neg', () => expect(sign(-2)).toBe(-1));",
        })
        .expect("measure");

    assert_eq!(coverage, 100.0);
    assert!(project.exists("sign.test.js"));
}

/// Partial coverage when only one branch runs; failing assertions still report.
#[test]
#[ignore]
fn jest_reports_partial_coverage_despite_failures() {
    let project = project();
    let runner = JestCoverageRunner::new(project.root(), &RunnerConfig::default());

    let coverage = runner
        .measure(&MeasureRequest {
            source_path: Path::new("sign.js"),
            artifact: "const { sign } = require('./sign');\ntest('pos', () => expect(sign(2)).toBe(2));",
        })
        .expect("measure");

    println!("coverage: {coverage:.2}");
    assert!(coverage > 0.0 && coverage < 100.0);
}
