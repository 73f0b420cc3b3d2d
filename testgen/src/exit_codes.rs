//! Stable exit codes for testgen CLI commands.

/// Every processed file met the coverage threshold (or needed no work).
pub const OK: i32 = 0;
/// Fatal setup error: invalid config, missing credentials, git failure.
pub const INVALID: i32 = 1;
/// At least one file ended partial, failed or errored.
pub const BELOW_THRESHOLD: i32 = 2;
