//! Deterministic, pure logic shared by the generation workflow.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod coverage_report;
pub mod evaluator;
pub mod extract;
pub mod filter;
pub mod language;
pub mod paths;
pub mod router;
pub mod types;
