//! Turning an experiment file into simulation inputs.

use cf_core::ParameterValues;
use cf_experiment::{Experiment, ExperimentError};
use cf_sim::{EventSolver, IntegratorType, LumpedCell, RunnerOptions, Simulation, SolverOptions};
use tracing::Level;

use crate::ProjectResult;
use crate::schema::{ExperimentFile, IntegratorDef, LogLevelDef};

impl From<IntegratorDef> for IntegratorType {
    fn from(def: IntegratorDef) -> Self {
        match def {
            IntegratorDef::Rk4 => IntegratorType::RK4,
            IntegratorDef::ForwardEuler => IntegratorType::ForwardEuler,
        }
    }
}

impl From<LogLevelDef> for Level {
    fn from(def: LogLevelDef) -> Self {
        match def {
            LogLevelDef::Error => Level::ERROR,
            LogLevelDef::Warn => Level::WARN,
            LogLevelDef::Info => Level::INFO,
            LogLevelDef::Debug => Level::DEBUG,
            LogLevelDef::Trace => Level::TRACE,
        }
    }
}

impl ExperimentFile {
    /// Cell parameter overrides.
    pub fn parameters(&self) -> ParameterValues {
        self.cell.parameters.clone()
    }

    /// Parsed experiment with every cycle expanded by its repeat count.
    pub fn experiment(&self) -> ProjectResult<Experiment> {
        let cycles = self
            .experiment
            .cycles
            .iter()
            .flat_map(|c| std::iter::repeat_n(&c.steps, c.repeat));
        let experiment = Experiment::from_cycles(cycles)?
            .with_period(&self.experiment.period)
            .map_err(ExperimentError::from)?;
        Ok(experiment)
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            max_dt_s: self.solver.max_dt_s,
            event_tol_s: self.solver.event_tol_s,
            max_steps: self.solver.max_steps,
            integrator: self.solver.integrator.into(),
        }
    }

    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            abort_log_level: self.runner.abort_log_level.into(),
        }
    }

    /// Reference cell with this file's parameter overrides.
    pub fn cell(&self) -> ProjectResult<LumpedCell> {
        Ok(LumpedCell::with_parameters(&self.parameters())?)
    }

    /// Ready-to-solve simulation of this file's experiment on the reference cell.
    pub fn simulation(&self) -> ProjectResult<Simulation<LumpedCell>> {
        let solver = EventSolver::new(self.solver_options())?;
        let simulation = Simulation::new(self.cell()?, self.experiment()?)?
            .with_solver(solver)
            .with_options(self.runner_options());
        Ok(simulation)
    }
}
