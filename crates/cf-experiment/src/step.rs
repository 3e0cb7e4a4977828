//! Typed experiment steps produced by the instruction parser.

use std::fmt;
use std::str::FromStr;

use cf_core::units::{Current, Power, Time, Voltage};

use crate::error::ParseError;

/// Control verb of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Discharge,
    Charge,
    /// Voltage-mode sustain.
    Hold,
    /// Zero current.
    Rest,
}

impl Operation {
    /// Current direction implied by the verb, if any.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::Discharge => Some(Direction::Discharge),
            Self::Charge => Some(Direction::Charge),
            Self::Hold | Self::Rest => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discharge => "Discharge",
            Self::Charge => "Charge",
            Self::Hold => "Hold",
            Self::Rest => "Rest",
        };
        f.write_str(name)
    }
}

/// Current sign convention: discharge is positive, charge is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Discharge,
    Charge,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Self::Discharge => 1.0,
            Self::Charge => -1.0,
        }
    }
}

/// What the step drives the cell with.
///
/// Current, C-rate and power values are already signed by direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drive {
    /// Fraction of the cell capacity per hour (e.g. `C/20` is 0.05).
    CRate(f64),
    Current(Current),
    Voltage(Voltage),
    Power(Power),
}

impl Drive {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::CRate(_) => "a C-rate",
            Self::Current(_) => "a current",
            Self::Voltage(_) => "a voltage",
            Self::Power(_) => "a power",
        }
    }
}

/// Quantity that ends an `until` step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// Current threshold given as a C-rate (e.g. `until C/50`).
    CRate(f64),
    Current(Current),
    Voltage(Voltage),
}

/// How a step ends: after a fixed time or when a threshold is crossed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepEnd {
    For(Time),
    Until(Threshold),
}

/// One parsed operating instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub(crate) instruction: String,
    pub(crate) operation: Operation,
    pub(crate) drive: Option<Drive>,
    pub(crate) end: StepEnd,
}

impl Step {
    /// Parse a single instruction, e.g. `"Charge at 1 A until 4.1 V"`.
    pub fn parse(instruction: &str) -> Result<Self, ParseError> {
        crate::parse::parse_instruction(instruction)
    }

    /// Instruction text as written.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn direction(&self) -> Option<Direction> {
        self.operation.direction()
    }

    /// Drive magnitude; `None` for rest steps.
    pub fn drive(&self) -> Option<Drive> {
        self.drive
    }

    pub fn end(&self) -> StepEnd {
        self.end
    }

    /// Fixed duration of a `for` step.
    pub fn duration(&self) -> Option<Time> {
        match self.end {
            StepEnd::For(t) => Some(t),
            StepEnd::Until(_) => None,
        }
    }

    /// Termination threshold of an `until` step.
    pub fn cutoff(&self) -> Option<Threshold> {
        match self.end {
            StepEnd::For(_) => None,
            StepEnd::Until(th) => Some(th),
        }
    }
}

impl FromStr for Step {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.instruction)
    }
}
