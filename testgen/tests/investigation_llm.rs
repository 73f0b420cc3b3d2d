//! Investigation tests for the live model and test runner.
//!
//! These tests exercise Gemini and Jest for real and are excluded from regular
//! CI runs because they need network access, API credentials and Node.js.
//!
//! Run with: `cargo test -p testgen --test investigation_llm -- --ignored`

#[path = "investigation/gemini.rs"]
mod gemini;

#[path = "investigation/jest.rs"]
mod jest;
