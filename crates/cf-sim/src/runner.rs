//! Experiment runner: solves compiled steps in order.
//!
//! Each step starts from the previous step's final state and end time. A step
//! ended by `final time` or by one of its own cut-off events hands over to the
//! next step; any other event ends the whole experiment.

use cf_experiment::CompiledExperiment;
use thiserror::Error;
use tracing::{Level, debug, error, info, instrument, trace, warn};

use crate::error::SimError;
use crate::model::CellModel;
use crate::solution::{ExperimentSolution, Termination};
use crate::solve::{Solver, StepRequest};

/// Options for experiment runs.
#[derive(Clone, Debug, PartialEq)]
pub struct RunnerOptions {
    /// Level of the log event emitted when an unintended event aborts a run.
    pub abort_log_level: Level,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            abort_log_level: Level::WARN,
        }
    }
}

/// Runner state, reported through progress callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running(usize),
    StepComplete(usize),
    Aborted(usize),
    Finished,
}

/// Progress snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct RunProgress {
    pub state: RunState,
    pub step_count: usize,
    /// Simulated time so far (seconds)
    pub sim_time_s: f64,
}

/// Successful run: the aggregated solution and the state it ended in.
#[derive(Clone, Debug)]
pub struct ExperimentOutcome<S> {
    pub solution: ExperimentSolution,
    pub final_state: S,
}

/// A step whose solve failed. Steps solved before it are kept in `partial`.
#[derive(Error, Debug)]
#[error("step {step} (\"{instruction}\") failed: {source}")]
pub struct RunError {
    pub step: usize,
    pub instruction: String,
    #[source]
    pub source: SimError,
    pub partial: Box<ExperimentSolution>,
}

/// Run all steps of `compiled` from state `x0`.
pub fn run_experiment<M, S>(
    model: &mut M,
    solver: &mut S,
    compiled: &CompiledExperiment,
    x0: M::State,
    options: &RunnerOptions,
) -> Result<ExperimentOutcome<M::State>, RunError>
where
    M: CellModel,
    S: Solver<M>,
{
    run_experiment_with_progress(model, solver, compiled, x0, options, None)
}

/// Run all steps of `compiled`, reporting every state transition.
#[instrument(skip_all, name = "experiment", fields(steps = compiled.steps().len()))]
pub fn run_experiment_with_progress<M, S>(
    model: &mut M,
    solver: &mut S,
    compiled: &CompiledExperiment,
    x0: M::State,
    options: &RunnerOptions,
    mut progress: Option<&mut dyn FnMut(RunProgress)>,
) -> Result<ExperimentOutcome<M::State>, RunError>
where
    M: CellModel,
    S: Solver<M>,
{
    let timescale = compiled.timescale();
    let step_count = compiled.steps().len();
    let mut report = |state: RunState, t: f64| {
        if let Some(cb) = progress.as_mut() {
            cb(RunProgress {
                state,
                step_count,
                sim_time_s: timescale.to_seconds(t),
            });
        }
    };

    let mut solution = ExperimentSolution::new();
    let mut x = x0;
    let mut t = 0.0;
    report(RunState::Pending, t);

    for step in compiled.steps() {
        report(RunState::Running(step.index), t);
        info!(step = step.index, instruction = %step.instruction, "step started");

        let request = StepRequest {
            index: step.index,
            inputs: &step.bundle,
            t_start: t,
            duration: step.time_budget,
            period: compiled.period(),
        };
        let output = match solver.solve(model, &x, &request) {
            Ok(output) => output,
            Err(source) => {
                error!(step = step.index, error = %source, "step solve failed");
                return Err(RunError {
                    step: step.index,
                    instruction: step.instruction.clone(),
                    source,
                    partial: Box::new(solution),
                });
            }
        };

        let termination = output.solution.termination.clone();
        t = output.solution.t_end().unwrap_or(t);
        info!(
            step = step.index,
            termination = %termination,
            duration_s = output.solution.duration_s(),
            "step finished"
        );
        solution.push(output.solution, step.bundle);
        x = output.final_state;

        match termination {
            Termination::FinalTime => {}
            Termination::Event(ref name) if step.intends(name) => {}
            Termination::Event(ref name) => {
                log_abort(options.abort_log_level, step.index, &step.instruction, name);
                solution.mark_aborted(step.index);
                report(RunState::Aborted(step.index), t);
                return Ok(ExperimentOutcome {
                    solution,
                    final_state: x,
                });
            }
        }
        report(RunState::StepComplete(step.index), t);
    }

    report(RunState::Finished, t);
    Ok(ExperimentOutcome {
        solution,
        final_state: x,
    })
}

fn log_abort(level: Level, step: usize, instruction: &str, event: &str) {
    const MSG: &str = "experiment stopped early by an event the step did not request";
    if level == Level::ERROR {
        error!(step, instruction, event, "{MSG}");
    } else if level == Level::WARN {
        warn!(step, instruction, event, "{MSG}");
    } else if level == Level::INFO {
        info!(step, instruction, event, "{MSG}");
    } else if level == Level::DEBUG {
        debug!(step, instruction, event, "{MSG}");
    } else {
        trace!(step, instruction, event, "{MSG}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimResult;
    use crate::events::EventRegistry;
    use crate::model::Variables;
    use crate::solution::Solution;
    use crate::solve::StepOutput;
    use cf_core::ParameterValues;
    use cf_core::params::names::CELL_CAPACITY;
    use cf_experiment::{Experiment, InputBundle, Timescale, events};
    use std::collections::VecDeque;

    /// Model whose state counts the steps applied to it.
    struct Counter {
        params: ParameterValues,
        events: EventRegistry,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                params: ParameterValues::new().with(CELL_CAPACITY, 1.0),
                events: EventRegistry::new(),
            }
        }
    }

    impl CellModel for Counter {
        type State = u32;

        fn default_parameters(&self) -> &ParameterValues {
            &self.params
        }

        fn timescale(&self) -> Timescale {
            Timescale::new(1.0).unwrap()
        }

        fn events(&self) -> &EventRegistry {
            &self.events
        }

        fn events_mut(&mut self) -> &mut EventRegistry {
            &mut self.events
        }

        fn initial_state(&self) -> u32 {
            0
        }

        fn rhs(&mut self, _t: f64, _x: &u32, _inputs: &InputBundle) -> SimResult<u32> {
            Ok(0)
        }

        fn variables(&self, _x: &u32, _inputs: &InputBundle) -> SimResult<Variables> {
            Ok(Variables {
                current_a: 0.0,
                voltage_v: 3.7,
                state_of_charge: 0.5,
            })
        }

        fn add(&self, a: &u32, b: &u32) -> u32 {
            a + b
        }

        fn scale(&self, a: &u32, _scale: f64) -> u32 {
            *a
        }
    }

    /// Replays a scripted outcome per step.
    struct Scripted {
        outcomes: VecDeque<SimResult<Termination>>,
        starts: Vec<f64>,
    }

    impl Scripted {
        fn new(outcomes: Vec<SimResult<Termination>>) -> Self {
            Self {
                outcomes: outcomes.into(),
                starts: Vec::new(),
            }
        }
    }

    impl Solver<Counter> for Scripted {
        fn solve(
            &mut self,
            _model: &mut Counter,
            x0: &u32,
            request: &StepRequest<'_>,
        ) -> SimResult<StepOutput<u32>> {
            self.starts.push(request.t_start);
            let termination = self
                .outcomes
                .pop_front()
                .unwrap_or(Ok(Termination::FinalTime))?;
            let mut solution = Solution::new(request.index);
            let vars = Variables {
                current_a: 0.0,
                voltage_v: 3.7,
                state_of_charge: 0.5,
            };
            let tau = Timescale::new(1.0).unwrap();
            solution.push(request.t_start, tau, &vars);
            solution.push(request.t_start + request.duration, tau, &vars);
            solution.termination = termination;
            Ok(StepOutput {
                solution,
                final_state: x0 + 1,
            })
        }
    }

    fn compiled(instructions: &[&str]) -> CompiledExperiment {
        let model = Counter::new();
        Experiment::new(instructions)
            .unwrap()
            .compile(model.default_parameters(), model.timescale())
            .unwrap()
    }

    const STEPS: [&str; 3] = [
        "Discharge at 1 A for 10 seconds",
        "Charge at 1 A until 4.1 V",
        "Rest for 5 seconds",
    ];

    #[test]
    fn all_steps_run_and_chain_time_and_state() {
        let mut model = Counter::new();
        let mut solver = Scripted::new(vec![
            Ok(Termination::FinalTime),
            Ok(Termination::Event(events::VOLTAGE_CUTOFF.into())),
            Ok(Termination::FinalTime),
        ]);
        let plan = compiled(&STEPS);
        let outcome =
            run_experiment(&mut model, &mut solver, &plan, 0, &RunnerOptions::default()).unwrap();

        assert_eq!(outcome.final_state, 3);
        assert_eq!(outcome.solution.steps().len(), 3);
        assert_eq!(outcome.solution.termination(), Some(&Termination::FinalTime));
        assert!(!outcome.solution.is_aborted());
        assert_eq!(solver.starts[0], 0.0);
        assert_eq!(solver.starts[1], 10.0);
        assert_eq!(solver.starts[2], 10.0 + 7.0 * 24.0 * 3600.0);
    }

    #[test]
    fn unintended_event_aborts_remaining_steps() {
        let mut model = Counter::new();
        let mut solver = Scripted::new(vec![Ok(Termination::Event("Minimum voltage".into()))]);
        let plan = compiled(&STEPS);
        let outcome =
            run_experiment(&mut model, &mut solver, &plan, 0, &RunnerOptions::default()).unwrap();

        assert_eq!(outcome.solution.steps().len(), 1);
        assert_eq!(outcome.solution.aborted_at(), Some(0));
        assert_eq!(
            outcome.solution.termination().map(|t| t.to_string()),
            Some("event: Minimum voltage".to_string())
        );
        assert_eq!(solver.starts.len(), 1);
    }

    #[test]
    fn another_steps_cutoff_is_not_intended() {
        let mut model = Counter::new();
        // Step 0 has no cut-off, so a voltage cut-off firing there is unintended.
        let mut solver =
            Scripted::new(vec![Ok(Termination::Event(events::VOLTAGE_CUTOFF.into()))]);
        let plan = compiled(&STEPS);
        let outcome =
            run_experiment(&mut model, &mut solver, &plan, 0, &RunnerOptions::default()).unwrap();
        assert_eq!(outcome.solution.aborted_at(), Some(0));
    }

    #[test]
    fn solver_failure_keeps_completed_steps() {
        let mut model = Counter::new();
        let mut solver = Scripted::new(vec![
            Ok(Termination::FinalTime),
            Err(SimError::ConvergenceFailed {
                what: "scripted failure",
            }),
        ]);
        let plan = compiled(&STEPS);
        let err = run_experiment(&mut model, &mut solver, &plan, 0, &RunnerOptions::default())
            .unwrap_err();

        assert_eq!(err.step, 1);
        assert_eq!(err.instruction, "Charge at 1 A until 4.1 V");
        assert_eq!(err.partial.steps().len(), 1);
        assert_eq!(err.partial.termination(), Some(&Termination::FinalTime));
        assert!(err.to_string().contains("scripted failure"));
    }

    #[test]
    fn progress_reports_each_transition() {
        let mut model = Counter::new();
        let mut solver = Scripted::new(vec![
            Ok(Termination::FinalTime),
            Ok(Termination::Event("Maximum voltage".into())),
        ]);
        let plan = compiled(&STEPS);
        let mut states = Vec::new();
        let mut cb = |p: RunProgress| states.push(p.state);
        run_experiment_with_progress(
            &mut model,
            &mut solver,
            &plan,
            0,
            &RunnerOptions::default(),
            Some(&mut cb),
        )
        .unwrap();

        assert_eq!(
            states,
            vec![
                RunState::Pending,
                RunState::Running(0),
                RunState::StepComplete(0),
                RunState::Running(1),
                RunState::Aborted(1),
            ]
        );
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn abort_is_logged_as_a_message_at_the_configured_level() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            log_abort(Level::WARN, 0, "Discharge at 2 C for 1 hour", "Minimum voltage");
        });

        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("WARN"), "{text}");
        assert!(
            text.contains("experiment stopped early by an event the step did not request"),
            "{text}"
        );
        assert!(!text.contains("MSG"), "{text}");
        assert!(text.contains("event=\"Minimum voltage\""), "{text}");
    }
}
