//! Generate, measure, evaluate and route for a single source file.
//!
//! The workflow is an explicit state machine over [`Phase`]. It owns the
//! [`GenerationState`] and merges the deltas returned by the generator and
//! the coverage agent; neither component mutates the state directly.

use std::path::PathBuf;

use tracing::{debug, info, instrument};

use crate::agents::coverage::{Measurement, measure};
use crate::agents::generator::TestGenerator;
use crate::core::evaluator::evaluate;
use crate::core::language::Language;
use crate::core::router::route;
use crate::core::types::{Decision, GenerationState, Phase};
use crate::io::coverage::CoverageRunner;
use crate::io::model::GenerativeModel;

/// Loop limits shared by every file of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkflowSettings {
    /// Minimum acceptable line coverage in percent.
    pub threshold: f64,
    /// Maximum number of regeneration cycles after the first attempt.
    pub max_attempts: u32,
}

/// Final state of one workflow invocation plus bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    pub state: GenerationState,
    pub generation_calls: u32,
    pub measurements: u32,
    /// Phases visited, in order, ending with [`Phase::Done`].
    pub trace: Vec<Phase>,
}

/// Drive one source file through the loop until the router says done.
///
/// Never fails: generation and measurement errors are folded into the state
/// as feedback. Terminates after at most `max_attempts + 1` generation calls.
#[instrument(skip_all, fields(source = %source_path.display()))]
pub fn run_workflow<M: GenerativeModel, R: CoverageRunner>(
    generator: &TestGenerator,
    model: &M,
    runner: &R,
    settings: WorkflowSettings,
    source_path: PathBuf,
    source_content: String,
    language: Language,
) -> WorkflowOutcome {
    let mut state = GenerationState::new(source_path, source_content, language);
    let mut generation_calls = 0u32;
    let mut measurements = 0u32;
    let mut trace = Vec::new();
    let mut phase = Phase::Generating;

    loop {
        trace.push(phase);
        phase = match phase {
            Phase::Generating => {
                let delta = generator.generate(model, &state);
                generation_calls += 1;
                state.apply_generation(delta);
                if state.candidate_artifact.is_some() {
                    Phase::Measuring
                } else {
                    // Nothing to measure; a failed generation ends the file.
                    state.coverage = 0.0;
                    info!(attempt = state.attempt, "generation failed, stopping");
                    Phase::Done
                }
            }
            Phase::Measuring => {
                measurements += 1;
                match measure(runner, &state) {
                    Measurement::Measured { coverage } => {
                        state.coverage = coverage;
                        Phase::Evaluating { measured: true }
                    }
                    Measurement::Failed { feedback } => {
                        state.coverage = 0.0;
                        state.feedback = feedback;
                        Phase::Evaluating { measured: false }
                    }
                }
            }
            Phase::Evaluating { measured } => {
                if measured {
                    state.feedback = evaluate(state.coverage, settings.threshold);
                }
                match route(
                    state.coverage,
                    state.attempt,
                    settings.threshold,
                    settings.max_attempts,
                ) {
                    Decision::Retry => Phase::Retry,
                    Decision::Done => Phase::Done,
                }
            }
            Phase::Retry => {
                state.attempt += 1;
                debug!(
                    attempt = state.attempt,
                    coverage = format!("{:.2}", state.coverage),
                    "retrying generation"
                );
                Phase::Generating
            }
            Phase::Done => {
                info!(
                    coverage = format!("{:.2}", state.coverage),
                    attempts = state.attempt,
                    "workflow finished"
                );
                return WorkflowOutcome {
                    state,
                    generation_calls,
                    measurements,
                    trace,
                };
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FileOutcome, MEASUREMENT_FAILURE_FEEDBACK, NO_CODE_BLOCK_FEEDBACK};
    use crate::test_support::{ScriptedCoverageRunner, ScriptedModel, fenced};

    const SETTINGS: WorkflowSettings = WorkflowSettings {
        threshold: 80.0,
        max_attempts: 3,
    };

    fn run(model: &ScriptedModel, runner: &ScriptedCoverageRunner, settings: WorkflowSettings) -> WorkflowOutcome {
        let generator = TestGenerator::new("Jest").expect("generator");
        run_workflow(
            &generator,
            model,
            runner,
            settings,
            PathBuf::from("calculator.js"),
            "exports.add = (a, b) => a + b;".to_string(),
            Language::JavaScript,
        )
    }

    fn js(code: &str) -> Result<String, String> {
        Ok(fenced("javascript", code))
    }

    #[test]
    fn first_attempt_meets_threshold() {
        let model = ScriptedModel::new(vec![js("test('a', () => {});")]);
        let runner = ScriptedCoverageRunner::new(vec![Ok(92.5)]);

        let outcome = run(&model, &runner, SETTINGS);

        assert_eq!(outcome.state.coverage, 92.5);
        assert_eq!(outcome.state.attempt, 0);
        assert_eq!(outcome.generation_calls, 1);
        assert_eq!(outcome.measurements, 1);
        assert_eq!(
            outcome.state.feedback,
            "Coverage is 92.50%, which meets the 80% threshold."
        );
        assert_eq!(
            outcome.trace,
            vec![
                Phase::Generating,
                Phase::Measuring,
                Phase::Evaluating { measured: true },
                Phase::Done,
            ]
        );
        assert_eq!(FileOutcome::classify(&outcome.state, 80.0), FileOutcome::Success);
    }

    #[test]
    fn retries_until_threshold_met() {
        let model = ScriptedModel::new(vec![js("test('a', () => {});"), js("test('b', () => {});")]);
        let runner = ScriptedCoverageRunner::new(vec![Ok(50.0), Ok(85.0)]);

        let outcome = run(&model, &runner, SETTINGS);

        assert_eq!(outcome.state.coverage, 85.0);
        assert_eq!(outcome.state.attempt, 1);
        assert_eq!(outcome.generation_calls, 2);
        assert_eq!(
            outcome.state.candidate_artifact.as_deref(),
            Some("test('b', () => {});")
        );
        let second_request = &model.requests()[1];
        assert!(second_request.user.contains("The current coverage is 50.00%"));
    }

    #[test]
    fn exhausts_attempts_below_threshold() {
        let model = ScriptedModel::new(vec![
            js("test('1', () => {});"),
            js("test('2', () => {});"),
            js("test('3', () => {});"),
            js("test('4', () => {});"),
        ]);
        let runner = ScriptedCoverageRunner::new(vec![Ok(10.0), Ok(20.0), Ok(30.0), Ok(40.0)]);

        let outcome = run(&model, &runner, SETTINGS);

        assert_eq!(outcome.generation_calls, 4);
        assert_eq!(outcome.measurements, 4);
        assert_eq!(outcome.state.attempt, 3);
        assert_eq!(outcome.state.coverage, 40.0);
        assert_eq!(FileOutcome::classify(&outcome.state, 80.0), FileOutcome::Partial);
    }

    #[test]
    fn missing_code_block_stops_without_measuring() {
        let model = ScriptedModel::new(vec![Ok("no code here".to_string())]);
        let runner = ScriptedCoverageRunner::new(vec![Ok(100.0)]);

        let outcome = run(&model, &runner, SETTINGS);

        assert_eq!(outcome.generation_calls, 1);
        assert_eq!(runner.calls(), 0);
        assert_eq!(outcome.state.coverage, 0.0);
        assert_eq!(outcome.state.feedback, NO_CODE_BLOCK_FEEDBACK);
        assert_eq!(outcome.trace, vec![Phase::Generating, Phase::Done]);
        assert_eq!(FileOutcome::classify(&outcome.state, 80.0), FileOutcome::Failure);
    }

    #[test]
    fn generation_failure_on_retry_ends_with_zero_coverage() {
        let model = ScriptedModel::new(vec![js("test('a', () => {});"), Err("quota exceeded".to_string())]);
        let runner = ScriptedCoverageRunner::new(vec![Ok(60.0)]);

        let outcome = run(&model, &runner, SETTINGS);

        assert_eq!(outcome.generation_calls, 2);
        assert_eq!(outcome.measurements, 1);
        assert_eq!(outcome.state.attempt, 1);
        assert_eq!(outcome.state.coverage, 0.0);
        assert!(outcome.state.candidate_artifact.is_none());
        assert!(outcome.state.feedback.contains("quota exceeded"));
    }

    #[test]
    fn measurement_error_keeps_diagnostic_and_retries() {
        let model = ScriptedModel::new(vec![js("test('bad' () => {});"), js("test('good', () => {});")]);
        let runner = ScriptedCoverageRunner::new(vec![Err("SyntaxError".to_string()), Ok(90.0)]);

        let outcome = run(&model, &runner, SETTINGS);

        assert_eq!(outcome.state.coverage, 90.0);
        assert_eq!(outcome.state.attempt, 1);
        assert_eq!(
            outcome.trace[..4],
            [
                Phase::Generating,
                Phase::Measuring,
                Phase::Evaluating { measured: false },
                Phase::Retry,
            ]
        );
        let retry_request = &model.requests()[1];
        assert!(retry_request.user.contains(MEASUREMENT_FAILURE_FEEDBACK));
    }

    #[test]
    fn zero_max_attempts_means_single_pass() {
        let model = ScriptedModel::new(vec![js("test('a', () => {});")]);
        let runner = ScriptedCoverageRunner::new(vec![Ok(5.0)]);

        let outcome = run(
            &model,
            &runner,
            WorkflowSettings {
                threshold: 80.0,
                max_attempts: 0,
            },
        );

        assert_eq!(outcome.generation_calls, 1);
        assert_eq!(outcome.state.attempt, 0);
        assert_eq!(outcome.trace.last(), Some(&Phase::Done));
    }

    #[test]
    fn coverage_equal_to_threshold_is_enough() {
        let model = ScriptedModel::new(vec![js("test('a', () => {});")]);
        let runner = ScriptedCoverageRunner::new(vec![Ok(80.0)]);

        let outcome = run(&model, &runner, SETTINGS);

        assert_eq!(outcome.generation_calls, 1);
        assert_eq!(FileOutcome::classify(&outcome.state, 80.0), FileOutcome::Success);
    }
}
