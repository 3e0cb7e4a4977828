//! Simulation of one experiment on one cell model.

use cf_experiment::{CompiledExperiment, Experiment, SolverInputs};
use tracing::debug;

use crate::error::SimResult;
use crate::events::register_experiment_events;
use crate::model::CellModel;
use crate::runner::{
    ExperimentOutcome, RunError, RunProgress, RunnerOptions, run_experiment_with_progress,
};
use crate::solution::ExperimentSolution;
use crate::solve::{EventSolver, Solver};

/// Binds an experiment to a model and solves it step by step.
///
/// The experiment is compiled against the model's default parameters when the
/// simulation is built, so bad instructions or missing parameters fail here
/// rather than part-way through a run.
pub struct Simulation<M: CellModel, S = EventSolver> {
    model: M,
    experiment: Experiment,
    compiled: CompiledExperiment,
    solver: S,
    options: RunnerOptions,
    outcome: Option<ExperimentOutcome<M::State>>,
}

impl<M: CellModel> Simulation<M> {
    pub fn new(mut model: M, experiment: Experiment) -> SimResult<Self> {
        let compiled = experiment.compile(model.default_parameters(), model.timescale())?;
        let added = register_experiment_events(model.events_mut(), compiled.steps());
        debug!(
            added,
            total = model.events().len(),
            steps = compiled.steps().len(),
            "experiment events registered"
        );
        Ok(Self {
            model,
            experiment,
            compiled,
            solver: EventSolver::default(),
            options: RunnerOptions::default(),
            outcome: None,
        })
    }
}

impl<M: CellModel, S: Solver<M>> Simulation<M, S> {
    /// Replace the step solver.
    pub fn with_solver<T: Solver<M>>(self, solver: T) -> Simulation<M, T> {
        Simulation {
            model: self.model,
            experiment: self.experiment,
            compiled: self.compiled,
            solver,
            options: self.options,
            outcome: None,
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    pub fn compiled(&self) -> &CompiledExperiment {
        &self.compiled
    }

    /// Labelled solver inputs, one map per step.
    pub fn experiment_inputs(&self) -> Vec<SolverInputs> {
        self.compiled.inputs()
    }

    /// Dimensionless time budget per step.
    pub fn experiment_times(&self) -> Vec<f64> {
        self.compiled.times()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Run every step from the model's initial state.
    pub fn solve(&mut self) -> Result<&ExperimentSolution, RunError> {
        self.run(None)
    }

    /// Like [`solve`](Self::solve), reporting each runner state transition.
    pub fn solve_with_progress(
        &mut self,
        progress: &mut dyn FnMut(RunProgress),
    ) -> Result<&ExperimentSolution, RunError> {
        self.run(Some(progress))
    }

    fn run(
        &mut self,
        progress: Option<&mut dyn FnMut(RunProgress)>,
    ) -> Result<&ExperimentSolution, RunError> {
        self.outcome = None;
        let x0 = self.model.initial_state();
        let outcome = run_experiment_with_progress(
            &mut self.model,
            &mut self.solver,
            &self.compiled,
            x0,
            &self.options,
            progress,
        )?;
        Ok(&self.outcome.insert(outcome).solution)
    }

    /// Solution of the last successful run.
    pub fn solution(&self) -> Option<&ExperimentSolution> {
        self.outcome.as_ref().map(|o| &o.solution)
    }

    /// Model state at the end of the last successful run.
    pub fn final_state(&self) -> Option<&M::State> {
        self.outcome.as_ref().map(|o| &o.final_state)
    }
}
