//! CellModel trait for pluggable battery models.

use cf_core::ParameterValues;
use cf_experiment::{InputBundle, Timescale};
use serde::Serialize;

use crate::error::SimResult;
use crate::events::EventRegistry;

/// Observable cell variables at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Variables {
    /// Terminal current, positive on discharge [A]
    pub current_a: f64,
    /// Terminal voltage [V]
    pub voltage_v: f64,
    /// State of charge [0, 1]
    pub state_of_charge: f64,
}

/// Trait for battery models driven by experiment inputs.
///
/// A CellModel must provide:
/// - Default parameter values (at least "Cell capacity [A.h]")
/// - A timescale: seconds per unit of the model's dimensionless time
/// - A mutable event registry holding its intrinsic physical events
/// - RHS in dimensionless time: x_dot = f(t, x, inputs)
/// - Observable variables for event evaluation and recording
/// - State arithmetic for integration: add states, scale by scalar
pub trait CellModel {
    /// State type (must be Clone).
    type State: Clone;

    fn default_parameters(&self) -> &ParameterValues;

    fn timescale(&self) -> Timescale;

    fn events(&self) -> &EventRegistry;

    fn events_mut(&mut self) -> &mut EventRegistry;

    /// Return the state at the start of an experiment.
    fn initial_state(&self) -> Self::State;

    /// Compute the state derivative with respect to dimensionless time.
    ///
    /// Takes &mut self to allow models to cache intermediate solves.
    fn rhs(&mut self, t: f64, x: &Self::State, inputs: &InputBundle) -> SimResult<Self::State>;

    /// Evaluate observables for state `x` under `inputs`.
    fn variables(&self, x: &Self::State, inputs: &InputBundle) -> SimResult<Variables>;

    /// Add two states element-wise: result = a + b.
    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State;

    /// Scale a state by a scalar: result = scale * a.
    fn scale(&self, a: &Self::State, scale: f64) -> Self::State;
}
