//! Lumped equivalent-circuit cell: open-circuit voltage, series resistance and
//! one RC polarization branch.
//!
//! Current is positive on discharge. The polarization voltage `v_rc` has the
//! same sign convention, so the terminal voltage is `OCV - v_rc - I*R0`.

use cf_core::ParameterValues;
use cf_core::params::names::CELL_CAPACITY;
use cf_core::units::constants::SECONDS_PER_HOUR;
use cf_experiment::{InputBundle, OperatingMode, Timescale};

use crate::error::{SimError, SimResult};
use crate::events::{EventKind, EventRegistry, MAXIMUM_VOLTAGE, MINIMUM_VOLTAGE};
use crate::model::{CellModel, Variables};

/// Parameter names understood by [`LumpedCell`].
pub mod names {
    pub use cf_core::params::names::CELL_CAPACITY;

    pub const SERIES_RESISTANCE: &str = "Series resistance [Ohm]";
    pub const POLARIZATION_RESISTANCE: &str = "Polarization resistance [Ohm]";
    pub const POLARIZATION_CAPACITANCE: &str = "Polarization capacitance [F]";
    pub const LOWER_VOLTAGE_CUTOFF: &str = "Lower voltage cut-off [V]";
    pub const UPPER_VOLTAGE_CUTOFF: &str = "Upper voltage cut-off [V]";
    pub const INITIAL_STATE_OF_CHARGE: &str = "Initial state of charge";
    pub const DISCHARGE_TIMESCALE: &str = "Discharge timescale [s]";
    pub const OCV_OFFSET: &str = "Open-circuit voltage offset [V]";
    pub const OCV_SLOPE: &str = "Open-circuit voltage slope [V]";
    pub const OCV_CURVATURE: &str = "Open-circuit voltage curvature [V]";

    pub const ALL: [&str; 11] = [
        CELL_CAPACITY,
        SERIES_RESISTANCE,
        POLARIZATION_RESISTANCE,
        POLARIZATION_CAPACITANCE,
        LOWER_VOLTAGE_CUTOFF,
        UPPER_VOLTAGE_CUTOFF,
        INITIAL_STATE_OF_CHARGE,
        DISCHARGE_TIMESCALE,
        OCV_OFFSET,
        OCV_SLOPE,
        OCV_CURVATURE,
    ];
}

/// Default parameter set: a 2.5 A.h cell between 3.0 V and 4.2 V.
pub fn default_parameter_values() -> ParameterValues {
    ParameterValues::new()
        .with(names::CELL_CAPACITY, 2.5)
        .with(names::SERIES_RESISTANCE, 0.03)
        .with(names::POLARIZATION_RESISTANCE, 0.015)
        .with(names::POLARIZATION_CAPACITANCE, 2000.0)
        .with(names::LOWER_VOLTAGE_CUTOFF, 3.0)
        .with(names::UPPER_VOLTAGE_CUTOFF, 4.2)
        .with(names::INITIAL_STATE_OF_CHARGE, 0.5)
        .with(names::DISCHARGE_TIMESCALE, SECONDS_PER_HOUR)
        .with(names::OCV_OFFSET, 3.0)
        .with(names::OCV_SLOPE, 1.1)
        .with(names::OCV_CURVATURE, 0.04)
}

/// State of charge and polarization voltage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LumpedCellState {
    pub soc: f64,
    /// Polarization voltage [V]
    pub v_rc: f64,
}

/// `offset + slope*soc + curvature*ln(soc/(1-soc))`, soc clamped away from 0 and 1.
#[derive(Clone, Copy, Debug, PartialEq)]
struct OcvCurve {
    offset: f64,
    slope: f64,
    curvature: f64,
}

impl OcvCurve {
    const SOC_EPS: f64 = 1e-6;

    fn eval(&self, soc: f64) -> f64 {
        let s = soc.clamp(Self::SOC_EPS, 1.0 - Self::SOC_EPS);
        self.offset + self.slope * s + self.curvature * (s / (1.0 - s)).ln()
    }
}

#[derive(Clone, Debug)]
pub struct LumpedCell {
    params: ParameterValues,
    events: EventRegistry,
    capacity_ah: f64,
    r0: f64,
    r1: f64,
    c1: f64,
    soc0: f64,
    timescale: Timescale,
    ocv: OcvCurve,
}

impl LumpedCell {
    /// Cell with the default parameter set.
    pub fn new() -> SimResult<Self> {
        Self::with_parameters(&ParameterValues::new())
    }

    /// Cell with `overrides` applied on top of the defaults.
    ///
    /// Names outside [`names::ALL`] are rejected.
    pub fn with_parameters(overrides: &ParameterValues) -> SimResult<Self> {
        let unknown = overrides
            .iter()
            .find(|(n, _)| !names::ALL.iter().any(|known| known == n));
        if let Some((name, _)) = unknown {
            return Err(cf_core::CoreError::UnknownParameter {
                name: name.to_string(),
            }
            .into());
        }
        let mut params = default_parameter_values();
        params.update(overrides);

        let v_min = params.require(names::LOWER_VOLTAGE_CUTOFF)?;
        let v_max = params.require(names::UPPER_VOLTAGE_CUTOFF)?;
        if v_min >= v_max {
            return Err(SimError::InvalidArg {
                what: "lower voltage cut-off must be below the upper cut-off",
            });
        }
        let soc0 = params.require(names::INITIAL_STATE_OF_CHARGE)?;
        if !(0.0..=1.0).contains(&soc0) {
            return Err(SimError::InvalidArg {
                what: "initial state of charge must lie in [0, 1]",
            });
        }

        let mut events = EventRegistry::new();
        events.register(MINIMUM_VOLTAGE, EventKind::MinimumVoltage { volts: v_min });
        events.register(MAXIMUM_VOLTAGE, EventKind::MaximumVoltage { volts: v_max });

        Ok(Self {
            capacity_ah: params.require_positive(CELL_CAPACITY)?,
            r0: params.require_positive(names::SERIES_RESISTANCE)?,
            r1: params.require_positive(names::POLARIZATION_RESISTANCE)?,
            c1: params.require_positive(names::POLARIZATION_CAPACITANCE)?,
            soc0,
            timescale: Timescale::new(params.require(names::DISCHARGE_TIMESCALE)?)?,
            ocv: OcvCurve {
                offset: params.require(names::OCV_OFFSET)?,
                slope: params.require(names::OCV_SLOPE)?,
                curvature: params.require(names::OCV_CURVATURE)?,
            },
            events,
            params,
        })
    }

    /// Open-circuit voltage at `soc` [V].
    pub fn ocv(&self, soc: f64) -> f64 {
        self.ocv.eval(soc)
    }

    /// Terminal current for state `x` under the active operating mode [A].
    fn current(&self, x: &LumpedCellState, inputs: &InputBundle) -> SimResult<f64> {
        let e = self.ocv(x.soc) - x.v_rc;
        match inputs.mode {
            OperatingMode::Current { amps } => Ok(amps),
            OperatingMode::Voltage { volts } => Ok((e - volts) / self.r0),
            OperatingMode::Power { watts } => {
                // R0*I^2 - E*I + P = 0, smaller root
                let disc = e * e - 4.0 * self.r0 * watts;
                if disc < 0.0 {
                    return Err(SimError::NonPhysical {
                        what: "power demand exceeds deliverable power",
                    });
                }
                Ok((e - disc.sqrt()) / (2.0 * self.r0))
            }
        }
    }
}

impl CellModel for LumpedCell {
    type State = LumpedCellState;

    fn default_parameters(&self) -> &ParameterValues {
        &self.params
    }

    fn timescale(&self) -> Timescale {
        self.timescale
    }

    fn events(&self) -> &EventRegistry {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventRegistry {
        &mut self.events
    }

    fn initial_state(&self) -> LumpedCellState {
        LumpedCellState {
            soc: self.soc0,
            v_rc: 0.0,
        }
    }

    fn rhs(
        &mut self,
        _t: f64,
        x: &LumpedCellState,
        inputs: &InputBundle,
    ) -> SimResult<LumpedCellState> {
        let i = self.current(x, inputs)?;
        let tau = self.timescale.seconds();
        Ok(LumpedCellState {
            soc: -i * tau / (SECONDS_PER_HOUR * self.capacity_ah),
            v_rc: tau * (i / self.c1 - x.v_rc / (self.r1 * self.c1)),
        })
    }

    fn variables(&self, x: &LumpedCellState, inputs: &InputBundle) -> SimResult<Variables> {
        let i = self.current(x, inputs)?;
        Ok(Variables {
            current_a: i,
            voltage_v: self.ocv(x.soc) - x.v_rc - i * self.r0,
            state_of_charge: x.soc,
        })
    }

    fn add(&self, a: &LumpedCellState, b: &LumpedCellState) -> LumpedCellState {
        LumpedCellState {
            soc: a.soc + b.soc,
            v_rc: a.v_rc + b.v_rc,
        }
    }

    fn scale(&self, a: &LumpedCellState, scale: f64) -> LumpedCellState {
        LumpedCellState {
            soc: a.soc * scale,
            v_rc: a.v_rc * scale,
        }
    }
}
