//! Step compiler: typed steps to numeric solver inputs.

use std::collections::BTreeMap;

use cf_core::params::names::CELL_CAPACITY;
use cf_core::units::constants::SECONDS_PER_WEEK;
use cf_core::units::{as_amps, as_seconds, as_volts, as_watts};
use cf_core::{CoreError, ParameterValues, ensure_finite, or_never};
use serde::{Serialize, Serializer};

use crate::error::CompileError;
use crate::step::{Direction, Drive, Operation, Step, StepEnd, Threshold};

/// Experiment event names.
pub mod events {
    pub const CURRENT_CUTOFF_POSITIVE: &str = "Current cut-off (positive) [A] [experiment]";
    pub const CURRENT_CUTOFF_NEGATIVE: &str = "Current cut-off (negative) [A] [experiment]";
    pub const VOLTAGE_CUTOFF: &str = "Voltage cut-off [V] [experiment]";
}

/// Solver input labels.
pub mod labels {
    pub const CURRENT_SWITCH: &str = "Current switch";
    pub const VOLTAGE_SWITCH: &str = "Voltage switch";
    pub const POWER_SWITCH: &str = "Power switch";
    pub const CURRENT_INPUT: &str = "Current input [A]";
    pub const VOLTAGE_INPUT: &str = "Voltage input [V]";
    pub const POWER_INPUT: &str = "Power input [W]";
    pub const CURRENT_CUTOFF: &str = "Current cut-off [A]";
    pub const VOLTAGE_CUTOFF: &str = "Voltage cut-off [V]";
}

/// Time budget of an `until` step that no cutoff has ended.
pub const DEFAULT_UNTIL_DURATION_S: f64 = SECONDS_PER_WEEK;

/// Labelled solver inputs, as handed across the solver boundary.
pub type SolverInputs = BTreeMap<&'static str, f64>;

/// Exactly one control mode is active per step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Current { amps: f64 },
    Voltage { volts: f64 },
    Power { watts: f64 },
}

/// Fully resolved numeric inputs for one solve, SI units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputBundle {
    pub mode: OperatingMode,
    pub current_cutoff_a: Option<f64>,
    pub voltage_cutoff_v: Option<f64>,
}

impl InputBundle {
    pub fn current(amps: f64) -> Self {
        Self {
            mode: OperatingMode::Current { amps },
            current_cutoff_a: None,
            voltage_cutoff_v: None,
        }
    }

    pub fn voltage(volts: f64) -> Self {
        Self {
            mode: OperatingMode::Voltage { volts },
            current_cutoff_a: None,
            voltage_cutoff_v: None,
        }
    }

    pub fn power(watts: f64) -> Self {
        Self {
            mode: OperatingMode::Power { watts },
            current_cutoff_a: None,
            voltage_cutoff_v: None,
        }
    }

    pub fn with_current_cutoff(mut self, amps: f64) -> Self {
        self.current_cutoff_a = Some(amps);
        self
    }

    pub fn with_voltage_cutoff(mut self, volts: f64) -> Self {
        self.voltage_cutoff_v = Some(volts);
        self
    }

    /// Direction the drive pushes current; `None` under voltage control or
    /// with zero drive.
    pub fn direction(&self) -> Option<Direction> {
        let drive = match self.mode {
            OperatingMode::Current { amps } => amps,
            OperatingMode::Power { watts } => watts,
            OperatingMode::Voltage { .. } => return None,
        };
        if drive > 0.0 {
            Some(Direction::Discharge)
        } else if drive < 0.0 {
            Some(Direction::Charge)
        } else {
            None
        }
    }

    pub fn has_cutoff(&self) -> bool {
        self.current_cutoff_a.is_some() || self.voltage_cutoff_v.is_some()
    }

    /// Serialize to the labelled form; absent values become the sentinel.
    pub fn inputs(&self) -> SolverInputs {
        let (switches, current, voltage, power) = match self.mode {
            OperatingMode::Current { amps } => ([1.0, 0.0, 0.0], Some(amps), None, None),
            OperatingMode::Voltage { volts } => ([0.0, 1.0, 0.0], None, Some(volts), None),
            OperatingMode::Power { watts } => ([0.0, 0.0, 1.0], None, None, Some(watts)),
        };
        BTreeMap::from([
            (labels::CURRENT_SWITCH, switches[0]),
            (labels::VOLTAGE_SWITCH, switches[1]),
            (labels::POWER_SWITCH, switches[2]),
            (labels::CURRENT_INPUT, or_never(current)),
            (labels::VOLTAGE_INPUT, or_never(voltage)),
            (labels::POWER_INPUT, or_never(power)),
            (labels::CURRENT_CUTOFF, or_never(self.current_cutoff_a)),
            (labels::VOLTAGE_CUTOFF, or_never(self.voltage_cutoff_v)),
        ])
    }
}

impl Serialize for InputBundle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inputs().serialize(serializer)
    }
}

/// One step ready for the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStep {
    pub index: usize,
    pub instruction: String,
    pub bundle: InputBundle,
    /// Wall-clock budget in seconds.
    pub duration_s: f64,
    /// Budget in the model's dimensionless time.
    pub time_budget: f64,
    /// Events whose firing ends this step as planned.
    pub intended_events: Vec<&'static str>,
}

impl CompiledStep {
    pub fn intends(&self, event: &str) -> bool {
        self.intended_events.contains(&event)
    }
}

/// Resolve a parsed step against the cell parameters.
///
/// Returns the bundle, the wall-clock budget and the intended events; the
/// caller converts the budget to model time.
pub fn compile_step(
    index: usize,
    step: &Step,
    params: &ParameterValues,
) -> Result<(InputBundle, f64, Vec<&'static str>), CompileError> {
    let capacity = || {
        params
            .require_positive(CELL_CAPACITY)
            .map_err(|source| CompileError::Capacity {
                index,
                instruction: step.instruction().to_string(),
                source,
            })
    };
    let inconsistent = |drive: &Drive| CompileError::InconsistentDrive {
        index,
        instruction: step.instruction().to_string(),
        operation: step.operation(),
        drive: drive.kind(),
    };

    let mut bundle = match (step.operation(), step.drive()) {
        (Operation::Rest, _) => InputBundle::current(0.0),
        (Operation::Discharge | Operation::Charge, Some(Drive::CRate(rate))) => {
            InputBundle::current(rate * capacity()?)
        }
        (Operation::Discharge | Operation::Charge, Some(Drive::Current(i))) => {
            InputBundle::current(as_amps(i))
        }
        (Operation::Discharge | Operation::Charge, Some(Drive::Power(p))) => {
            InputBundle::power(as_watts(p))
        }
        (Operation::Hold, Some(Drive::Voltage(v))) => InputBundle::voltage(as_volts(v)),
        (_, Some(drive)) => return Err(inconsistent(&drive)),
        (operation, None) => {
            return Err(CompileError::MissingDrive {
                index,
                instruction: step.instruction().to_string(),
                operation,
            });
        }
    };

    let mut intended = Vec::new();
    let duration_s = match step.end() {
        StepEnd::For(t) => as_seconds(t),
        StepEnd::Until(threshold) => {
            match threshold {
                Threshold::CRate(rate) => {
                    bundle = bundle.with_current_cutoff(rate * capacity()?);
                    intended.extend([
                        events::CURRENT_CUTOFF_POSITIVE,
                        events::CURRENT_CUTOFF_NEGATIVE,
                    ]);
                }
                Threshold::Current(i) => {
                    bundle = bundle.with_current_cutoff(as_amps(i));
                    intended.extend([
                        events::CURRENT_CUTOFF_POSITIVE,
                        events::CURRENT_CUTOFF_NEGATIVE,
                    ]);
                }
                Threshold::Voltage(v) => {
                    bundle = bundle.with_voltage_cutoff(as_volts(v));
                    intended.push(events::VOLTAGE_CUTOFF);
                }
            }
            DEFAULT_UNTIL_DURATION_S
        }
    };

    check_finite(index, step, &bundle, duration_s)?;
    Ok((bundle, duration_s, intended))
}

fn check_finite(
    index: usize,
    step: &Step,
    bundle: &InputBundle,
    duration_s: f64,
) -> Result<(), CompileError> {
    let wrap = |source: CoreError| CompileError::NonFinite {
        index,
        instruction: step.instruction().to_string(),
        source,
    };
    let magnitude = match bundle.mode {
        OperatingMode::Current { amps } => amps,
        OperatingMode::Voltage { volts } => volts,
        OperatingMode::Power { watts } => watts,
    };
    ensure_finite(magnitude, "step magnitude").map_err(wrap)?;
    ensure_finite(duration_s, "step duration").map_err(wrap)?;
    if let Some(c) = bundle.current_cutoff_a {
        ensure_finite(c, "current cut-off").map_err(wrap)?;
    }
    if let Some(v) = bundle.voltage_cutoff_v {
        ensure_finite(v, "voltage cut-off").map_err(wrap)?;
    }
    Ok(())
}
