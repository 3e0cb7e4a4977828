//! Error types for simulation operations.

use cf_core::CoreError;
use cf_experiment::CompileError;
use thiserror::Error;

/// Errors encountered while setting up or solving a step.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: &'static str },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: &'static str },

    #[error("Parameter error: {0}")]
    Parameter(#[from] CoreError),

    #[error("Experiment compilation failed: {0}")]
    Compile(#[from] CompileError),
}

pub type SimResult<T> = Result<T, SimError>;
