//! Coverage feedback text.
//!
//! The returned message is fed verbatim into the next generation prompt, so
//! its wording is part of the contract with the generator.

/// Describe how `coverage` compares to `threshold`.
pub fn evaluate(coverage: f64, threshold: f64) -> String {
    if coverage >= threshold {
        format!("Coverage is {coverage:.2}%, which meets the {threshold}% threshold.")
    } else {
        format!(
            "The current coverage is {coverage:.2}%, which is below the required {threshold}%. \
Please generate more tests to cover untested logic, branches, and edge cases."
        )
    }
}
