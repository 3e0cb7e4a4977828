//! Error types for experiment parsing and compilation.

use cf_core::CoreError;
use thiserror::Error;

use crate::step::Operation;

/// An instruction that does not match the step grammar.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot parse \"{instruction}\" at column {column}: {kind}")]
pub struct ParseError {
    /// Full instruction text.
    pub instruction: String,
    /// 1-based character column of the offending token.
    pub column: usize,
    pub kind: ParseErrorKind,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    #[error("empty instruction")]
    Empty,

    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),

    #[error("expected {expected}, found \"{found}\"")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
    },

    #[error("expected {expected}, found end of instruction")]
    UnexpectedEnd { expected: &'static str },

    #[error("invalid number \"{0}\"")]
    InvalidNumber(String),

    #[error("unknown unit \"{unit}\", expected {expected}")]
    UnknownUnit {
        unit: String,
        expected: &'static str,
    },

    #[error("C-rate divisor must be positive")]
    ZeroDivisor,
}

/// A parsed step that cannot be turned into solver inputs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("step {index} (\"{instruction}\"): cannot resolve C-rate against cell capacity: {source}")]
    Capacity {
        index: usize,
        instruction: String,
        #[source]
        source: CoreError,
    },

    #[error("step {index} (\"{instruction}\"): {operation} cannot be driven by {drive}")]
    InconsistentDrive {
        index: usize,
        instruction: String,
        operation: Operation,
        drive: &'static str,
    },

    #[error("step {index} (\"{instruction}\"): {operation} requires a magnitude")]
    MissingDrive {
        index: usize,
        instruction: String,
        operation: Operation,
    },

    #[error("step {index} (\"{instruction}\"): {source}")]
    NonFinite {
        index: usize,
        instruction: String,
        #[source]
        source: CoreError,
    },

    #[error("Invalid output period: {period_s} s")]
    InvalidPeriod { period_s: f64 },
}

/// Errors building an [`Experiment`](crate::Experiment).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExperimentError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("experiment has no steps")]
    Empty,

    #[error("cycle {cycle} has no steps")]
    EmptyCycle { cycle: usize },
}
