//! Retry decision for the generation loop.

use crate::core::types::Decision;

/// Decide whether another generation cycle should run.
///
/// Coverage equal to the threshold counts as met. Once `attempt` reaches
/// `max_attempts` the loop stops regardless of coverage, so a file sees at most
/// `max_attempts + 1` generation calls.
pub fn route(coverage: f64, attempt: u32, threshold: f64, max_attempts: u32) -> Decision {
    if coverage < threshold && attempt < max_attempts {
        Decision::Retry
    } else {
        Decision::Done
    }
}
