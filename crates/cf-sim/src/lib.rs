//! Experiment simulation for battery cell models.
//!
//! Provides:
//! - The `CellModel` trait and a lumped equivalent-circuit reference cell
//! - Fixed-step RK4 and forward Euler integrators
//! - Termination events and the experiment event synthesizer
//! - An event-locating step solver
//! - The experiment runner and the `Simulation` facade

pub mod error;
pub mod events;
pub mod integrator;
pub mod lumped;
pub mod model;
pub mod runner;
pub mod sim;
pub mod solution;
pub mod solve;

pub use error::{SimError, SimResult};
pub use events::{
    Crossing, Event, EventKind, EventRegistry, MAXIMUM_VOLTAGE, MINIMUM_VOLTAGE,
    register_experiment_events,
};
pub use integrator::{ForwardEuler, Integrator, IntegratorType, RK4};
pub use lumped::{LumpedCell, LumpedCellState, default_parameter_values};
pub use model::{CellModel, Variables};
pub use runner::{
    ExperimentOutcome, RunError, RunProgress, RunState, RunnerOptions, run_experiment,
    run_experiment_with_progress,
};
pub use sim::Simulation;
pub use solution::{ExperimentSolution, Solution, Termination};
pub use solve::{EventSolver, Solver, SolverOptions, StepOutput, StepRequest};
