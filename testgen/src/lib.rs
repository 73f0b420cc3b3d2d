//! Coverage-driven unit test generation.
//!
//! For each JavaScript/TypeScript source file, a generative model writes a
//! Jest test file, the test runner measures the file's line coverage, and the
//! model is asked again with feedback until a threshold is reached or the
//! retry budget is spent. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (routing, evaluation, extraction,
//!   coverage report parsing, filtering). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, model HTTP client, test
//!   runner processes, git, filesystem scans). Behind traits where tests need
//!   fakes.
//!
//! The [`agents`] wrap the model and runner seams, [`workflow`] drives one
//! file through the retry loop, and [`run`] plans and executes a whole run
//! into a [`report::RunReport`].

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod report;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
