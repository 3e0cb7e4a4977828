//! Battery cycling experiments.
//!
//! Provides:
//! - A fixed-grammar parser for operating instructions
//!   ("Discharge at C/20 for 1 hour", "Hold at 4.1 V until 50 mA", ...)
//! - A step compiler producing labelled solver inputs and time budgets
//! - Conversion of wall-clock durations to a model's dimensionless time

pub mod compile;
pub mod error;
pub mod experiment;
pub mod parse;
pub mod step;
pub mod timescale;

// Re-exports for public API
pub use compile::{
    CompiledStep, DEFAULT_UNTIL_DURATION_S, InputBundle, OperatingMode, SolverInputs, events,
    labels,
};
pub use error::{CompileError, ExperimentError, ParseError, ParseErrorKind};
pub use experiment::{CompiledExperiment, DEFAULT_PERIOD_S, Experiment};
pub use parse::{parse_duration, parse_instruction};
pub use step::{Direction, Drive, Operation, Step, StepEnd, Threshold};
pub use timescale::Timescale;
