//! Diagnostic tracing for testgen runs.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: progress and diagnostics via `RUST_LOG`,
//!   output to stderr. Not part of the product output.
//!
//! - **Run report (`report`)**: the per-file summary on stdout and the
//!   optional JSON report. Always produced, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "testgen=info";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=testgen=debug testgen backfill
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
