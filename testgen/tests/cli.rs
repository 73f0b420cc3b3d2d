//! CLI tests for startup handling.
//!
//! Spawns the testgen binary and verifies that configuration problems stop
//! the run with the fatal exit code before any file is processed.

use std::fs;
use std::process::Command;

use testgen::exit_codes;
use testgen::test_support::TestProject;

const KEY_VAR: &str = "TESTGEN_CLI_TEST_KEY";

fn testgen(project: &TestProject) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_testgen"));
    cmd.arg("--root")
        .arg(project.root())
        .env_remove(KEY_VAR)
        .env("RUST_LOG", "off");
    cmd
}

fn write_config(project: &TestProject, extra: &str) {
    project.write(
        "testgen.toml",
        &format!("[model]\napi_key_env = \"{KEY_VAR}\"\n{extra}"),
    );
}

#[test]
fn missing_api_key_is_fatal() {
    let project = TestProject::new();
    write_config(&project, "");
    project.write("src/app.js", "exports.x = 1;\n");

    let output = testgen(&project).arg("backfill").output().expect("run testgen");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(KEY_VAR), "stderr: {stderr}");
    assert!(!project.exists("src/app.test.js"));
}

#[test]
fn malformed_config_is_fatal() {
    let project = TestProject::new();
    project.write("testgen.toml", "coverage_threshold = \"high\"\n");

    let status = testgen(&project)
        .env(KEY_VAR, "dummy")
        .arg("backfill")
        .status()
        .expect("run testgen");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn out_of_range_threshold_override_is_fatal() {
    let project = TestProject::new();
    write_config(&project, "");

    let status = testgen(&project)
        .env(KEY_VAR, "dummy")
        .args(["--threshold", "150", "backfill"])
        .status()
        .expect("run testgen");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn key_from_dotenv_allows_an_empty_run() {
    let project = TestProject::new();
    write_config(&project, "");
    project.write(".env", &format!("{KEY_VAR}=from-dotenv\n"));
    project.write("README.md", "nothing to test\n");

    let output = testgen(&project)
        .args(["file", "README.md"])
        .output()
        .expect("run testgen");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&output.stdout).contains("No files to process."));
}

#[test]
fn init_writes_default_config() {
    let project = TestProject::new();

    let status = testgen(&project).arg("init").status().expect("run testgen");

    assert_eq!(status.code(), Some(exit_codes::OK));
    let written = fs::read_to_string(project.root().join("testgen.toml")).expect("config");
    assert!(written.contains("coverage_threshold = 80.0"));

    let again = testgen(&project).arg("init").status().expect("run testgen");
    assert_eq!(again.code(), Some(exit_codes::INVALID));
}
