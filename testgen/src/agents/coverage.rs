//! Coverage checker agent.

use tracing::{info, instrument, warn};

use crate::core::types::{GenerationState, MEASUREMENT_FAILURE_FEEDBACK};
use crate::io::coverage::{CoverageRunner, MeasureRequest};

/// Result of one measurement attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    Measured { coverage: f64 },
    /// The runner could not produce a measurement; coverage counts as 0.
    Failed { feedback: String },
}

/// Run the snapshot's artifact through `runner`.
///
/// Runner errors are contained as [`Measurement::Failed`]. A snapshot without
/// an artifact is also a failed measurement.
#[instrument(skip_all, fields(source = %state.source_path.display(), attempt = state.attempt))]
pub fn measure<R: CoverageRunner>(runner: &R, state: &GenerationState) -> Measurement {
    let Some(artifact) = state.candidate_artifact.as_deref() else {
        return Measurement::Failed {
            feedback: "Test generation failed, so no coverage could be calculated.".to_string(),
        };
    };

    let request = MeasureRequest {
        source_path: &state.source_path,
        artifact,
    };
    match runner.measure(&request) {
        Ok(coverage) => {
            let coverage = if coverage.is_nan() {
                0.0
            } else {
                coverage.clamp(0.0, 100.0)
            };
            info!(coverage = format!("{coverage:.2}"), "coverage measured");
            Measurement::Measured { coverage }
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "error during coverage analysis");
            Measurement::Failed {
                feedback: MEASUREMENT_FAILURE_FEEDBACK.to_string(),
            }
        }
    }
}
