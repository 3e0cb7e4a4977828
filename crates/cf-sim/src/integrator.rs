//! Fixed-step time integrators.

use cf_experiment::InputBundle;

use crate::error::SimResult;
use crate::model::CellModel;

/// Trait for time integrators.
pub trait Integrator {
    /// Advance state by one step of size `dt` under constant `inputs`.
    fn step<M: CellModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
        inputs: &InputBundle,
    ) -> SimResult<M::State>;
}

/// Classical RK4 (Runge-Kutta 4th order) integrator.
#[derive(Clone, Debug)]
pub struct RK4;

impl Integrator for RK4 {
    fn step<M: CellModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
        inputs: &InputBundle,
    ) -> SimResult<M::State> {
        let k1 = model.rhs(t, x, inputs)?;

        let x2 = model.add(x, &model.scale(&k1, 0.5 * dt));
        let k2 = model.rhs(t + 0.5 * dt, &x2, inputs)?;

        let x3 = model.add(x, &model.scale(&k2, 0.5 * dt));
        let k3 = model.rhs(t + 0.5 * dt, &x3, inputs)?;

        let x4 = model.add(x, &model.scale(&k3, dt));
        let k4 = model.rhs(t + dt, &x4, inputs)?;

        // Combine: x_new = x + (dt/6) * (k1 + 2*k2 + 2*k3 + k4)
        let k_sum = model.add(
            &model.add(&k1, &model.scale(&k2, 2.0)),
            &model.add(&model.scale(&k3, 2.0), &k4),
        );

        Ok(model.add(x, &model.scale(&k_sum, dt / 6.0)))
    }
}

/// Forward Euler (explicit, 1st order, fast for testing).
/// Calls rhs() once per step instead of 4 times (RK4).
#[derive(Clone, Debug)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn step<M: CellModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
        inputs: &InputBundle,
    ) -> SimResult<M::State> {
        let xdot = model.rhs(t, x, inputs)?;
        Ok(model.add(x, &model.scale(&xdot, dt)))
    }
}

/// Integrator selection for the event solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegratorType {
    /// 4th-order Runge-Kutta (default, most accurate, 4 rhs calls per step).
    #[default]
    RK4,
    /// Forward Euler (1st-order, faster, 1 rhs call per step).
    ForwardEuler,
}

impl IntegratorType {
    pub(crate) fn step<M: CellModel>(
        self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
        inputs: &InputBundle,
    ) -> SimResult<M::State> {
        match self {
            Self::RK4 => RK4.step(model, t, x, dt, inputs),
            Self::ForwardEuler => ForwardEuler.step(model, t, x, dt, inputs),
        }
    }
}
