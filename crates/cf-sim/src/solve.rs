//! Step solver with event location.

use cf_experiment::InputBundle;

use crate::error::{SimError, SimResult};
use crate::events::EventRegistry;
use crate::integrator::IntegratorType;
use crate::model::{CellModel, Variables};
use crate::solution::{Solution, Termination};

/// One solve: constant inputs over a bounded time window.
#[derive(Clone, Copy, Debug)]
pub struct StepRequest<'a> {
    pub index: usize,
    pub inputs: &'a InputBundle,
    /// Start time (dimensionless)
    pub t_start: f64,
    /// Time budget (dimensionless)
    pub duration: f64,
    /// Recording period (dimensionless)
    pub period: f64,
}

/// Result of one solve: the recorded solution and the state to continue from.
#[derive(Clone, Debug)]
pub struct StepOutput<S> {
    pub solution: Solution,
    pub final_state: S,
}

/// Solves one step of an experiment.
pub trait Solver<M: CellModel> {
    fn solve(
        &mut self,
        model: &mut M,
        x0: &M::State,
        request: &StepRequest<'_>,
    ) -> SimResult<StepOutput<M::State>>;
}

/// Options for the event solver.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverOptions {
    /// Largest integration step (seconds)
    pub max_dt_s: f64,
    /// Width of the bracket left around an event crossing (seconds)
    pub event_tol_s: f64,
    /// Maximum integration steps per solve (safety limit)
    pub max_steps: usize,
    /// Integrator type (default: RK4)
    pub integrator: IntegratorType,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_dt_s: 10.0,
            event_tol_s: 1e-3,
            max_steps: 1_000_000,
            integrator: IntegratorType::default(),
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.max_dt_s.is_finite() && self.max_dt_s > 0.0) {
            return Err(SimError::InvalidArg {
                what: "max_dt_s must be positive",
            });
        }
        if !(self.event_tol_s.is_finite() && self.event_tol_s > 0.0) {
            return Err(SimError::InvalidArg {
                what: "event_tol_s must be positive",
            });
        }
        if self.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        Ok(())
    }
}

/// Fixed-step explicit integration with event detection.
///
/// Steps are aligned to the recording grid and capped at `max_dt_s`. When an
/// event crosses zero inside a step, the step is bisected until the crossing
/// is bracketed to within `event_tol_s`, and the solve ends just past it.
#[derive(Clone, Debug, Default)]
pub struct EventSolver {
    options: SolverOptions,
}

impl EventSolver {
    pub fn new(options: SolverOptions) -> SimResult<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }
}

/// State, observables and event values at one instant.
struct Point<S> {
    x: S,
    vars: Variables,
    g: Vec<Option<f64>>,
}

fn observe<M: CellModel>(
    model: &M,
    events: &EventRegistry,
    x: M::State,
    inputs: &InputBundle,
) -> SimResult<Point<M::State>> {
    let vars = model.variables(&x, inputs)?;
    if !(vars.current_a.is_finite() && vars.voltage_v.is_finite()) {
        return Err(SimError::NonPhysical {
            what: "non-finite current or voltage",
        });
    }
    let g = events.evaluate(&vars, inputs);
    Ok(Point { x, vars, g })
}

impl<M: CellModel> Solver<M> for EventSolver {
    fn solve(
        &mut self,
        model: &mut M,
        x0: &M::State,
        request: &StepRequest<'_>,
    ) -> SimResult<StepOutput<M::State>> {
        if !(request.duration.is_finite() && request.duration >= 0.0) {
            return Err(SimError::InvalidArg {
                what: "step duration must be non-negative",
            });
        }
        if !(request.period.is_finite() && request.period > 0.0) {
            return Err(SimError::InvalidArg {
                what: "recording period must be positive",
            });
        }

        let opts = &self.options;
        let tau = model.timescale();
        let dt_max = tau.to_dimensionless(opts.max_dt_s);
        let tol = tau.to_dimensionless(opts.event_tol_s);
        let inputs = request.inputs;
        // Events are fixed for the duration of a solve.
        let events = model.events().clone();

        let t_start = request.t_start;
        let t_end = t_start + request.duration;
        let eps = 1e-12 * t_end.abs().max(1.0);

        let mut solution = Solution::new(request.index);
        let mut t = t_start;
        let mut here = observe(&*model, &events, x0.clone(), inputs)?;
        solution.push(t, tau, &here.vars);

        if let Some(event) = events.first_tripped(&here.g, inputs) {
            solution.termination = Termination::Event(event.name.clone());
            return Ok(StepOutput {
                solution,
                final_state: here.x,
            });
        }

        let mut sample = 1u64;
        let mut steps = 0usize;
        while t_end - t > eps {
            if steps >= opts.max_steps {
                return Err(SimError::ConvergenceFailed {
                    what: "step limit reached before final time",
                });
            }

            let next_sample = t_start + sample as f64 * request.period;
            let remaining = t_end - t;
            let h = dt_max.min(next_sample - t).min(remaining);
            let x_new = opts.integrator.step(model, t, &here.x, h, inputs)?;
            let next = observe(&*model, &events, x_new, inputs)?;

            if events.first_crossed(&here.g, &next.g).is_some() {
                let (h_hit, hit) = locate(
                    model,
                    &events,
                    opts.integrator,
                    t,
                    &here,
                    h,
                    next,
                    inputs,
                    tol,
                )?;
                let name = events
                    .first_crossed(&here.g, &hit.g)
                    .map(|e| e.name.clone())
                    .ok_or(SimError::ConvergenceFailed {
                        what: "event location lost the crossing",
                    })?;
                solution.push(t + h_hit, tau, &hit.vars);
                solution.termination = Termination::Event(name);
                return Ok(StepOutput {
                    solution,
                    final_state: hit.x,
                });
            }

            t = if h >= remaining { t_end } else { t + h };
            here = next;
            steps += 1;

            let on_grid = t >= next_sample - eps;
            if on_grid {
                sample += 1;
            }
            if on_grid || t_end - t <= eps {
                solution.push(t, tau, &here.vars);
            }
        }

        solution.termination = Termination::FinalTime;
        Ok(StepOutput {
            solution,
            final_state: here.x,
        })
    }
}

/// Bisect a step of size `h` from `from` until the first crossing is
/// bracketed to within `tol`. Returns the step size just past the crossing.
#[allow(clippy::too_many_arguments)]
fn locate<M: CellModel>(
    model: &mut M,
    events: &EventRegistry,
    integrator: IntegratorType,
    t: f64,
    from: &Point<M::State>,
    h: f64,
    past: Point<M::State>,
    inputs: &InputBundle,
    tol: f64,
) -> SimResult<(f64, Point<M::State>)> {
    const MAX_ITER: usize = 200;

    let mut lo = 0.0;
    let mut hi = h;
    let mut best = past;
    let mut iter = 0;
    while hi - lo > tol {
        if iter >= MAX_ITER {
            return Err(SimError::ConvergenceFailed {
                what: "event bisection did not converge",
            });
        }
        let mid = 0.5 * (lo + hi);
        let x_mid = integrator.step(model, t, &from.x, mid, inputs)?;
        let point = observe(&*model, events, x_mid, inputs)?;
        if events.first_crossed(&from.g, &point.g).is_some() {
            hi = mid;
            best = point;
        } else {
            lo = mid;
        }
        iter += 1;
    }
    Ok((hi, best))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, MINIMUM_VOLTAGE};
    use cf_core::ParameterValues;
    use cf_experiment::Timescale;

    /// Voltage falls linearly with delivered charge; exact under RK4.
    struct Ramp {
        params: ParameterValues,
        events: EventRegistry,
        volts_per_coulomb: f64,
    }

    impl Ramp {
        fn new(v_min: f64) -> Self {
            let mut events = EventRegistry::new();
            events.register(MINIMUM_VOLTAGE, EventKind::MinimumVoltage { volts: v_min });
            Self {
                params: ParameterValues::new(),
                events,
                volts_per_coulomb: 0.01,
            }
        }

        fn amps(inputs: &InputBundle) -> f64 {
            match inputs.mode {
                cf_experiment::OperatingMode::Current { amps } => amps,
                _ => 0.0,
            }
        }
    }

    impl CellModel for Ramp {
        type State = f64;

        fn default_parameters(&self) -> &ParameterValues {
            &self.params
        }

        fn timescale(&self) -> Timescale {
            Timescale::new(10.0).unwrap()
        }

        fn events(&self) -> &EventRegistry {
            &self.events
        }

        fn events_mut(&mut self) -> &mut EventRegistry {
            &mut self.events
        }

        fn initial_state(&self) -> f64 {
            4.0
        }

        fn rhs(&mut self, _t: f64, _x: &f64, inputs: &InputBundle) -> SimResult<f64> {
            // d(voltage)/d(t_hat) = -k * I * tau
            Ok(-self.volts_per_coulomb * Self::amps(inputs) * 10.0)
        }

        fn variables(&self, x: &f64, inputs: &InputBundle) -> SimResult<Variables> {
            Ok(Variables {
                current_a: Self::amps(inputs),
                voltage_v: *x,
                state_of_charge: 0.5,
            })
        }

        fn add(&self, a: &f64, b: &f64) -> f64 {
            a + b
        }

        fn scale(&self, a: &f64, scale: f64) -> f64 {
            a * scale
        }
    }

    fn request(inputs: &InputBundle, duration_s: f64) -> StepRequest<'_> {
        StepRequest {
            index: 0,
            inputs,
            t_start: 0.0,
            duration: duration_s / 10.0,
            period: 6.0,
        }
    }

    #[test]
    fn runs_to_final_time_on_sample_grid() {
        let mut model = Ramp::new(0.0);
        let inputs = InputBundle::current(1.0);
        let mut solver = EventSolver::default();
        let out = solver.solve(&mut model, &4.0, &request(&inputs, 150.0)).unwrap();

        assert_eq!(out.solution.termination, Termination::FinalTime);
        // 150 s at a 60 s period: 0, 60, 120, 150
        assert_eq!(out.solution.len(), 4);
        assert!((out.solution.time_s[1] - 60.0).abs() < 1e-9);
        assert!((out.solution.time_s[3] - 150.0).abs() < 1e-9);
        assert!((out.final_state - (4.0 - 0.01 * 150.0)).abs() < 1e-9);
    }

    #[test]
    fn locates_minimum_voltage_within_tolerance() {
        let mut model = Ramp::new(3.0);
        let inputs = InputBundle::current(2.0);
        let mut solver = EventSolver::default();
        let out = solver.solve(&mut model, &4.0, &request(&inputs, 3600.0)).unwrap();

        assert_eq!(
            out.solution.termination,
            Termination::Event(MINIMUM_VOLTAGE.to_string())
        );
        // 1 V at 0.02 V/s
        let t_hit = *out.solution.time_s.last().unwrap();
        assert!(t_hit >= 50.0 && t_hit - 50.0 <= 1e-3 + 1e-9, "t_hit = {t_hit}");
        assert!(out.final_state <= 3.0);
    }

    #[test]
    fn tripped_limit_ends_step_immediately() {
        let mut model = Ramp::new(3.0);
        let inputs = InputBundle::current(1.0);
        let mut solver = EventSolver::default();
        let out = solver.solve(&mut model, &2.5, &request(&inputs, 60.0)).unwrap();
        assert_eq!(out.solution.len(), 1);
        assert_eq!(out.solution.termination.event_name(), Some(MINIMUM_VOLTAGE));
    }

    #[test]
    fn step_limit_is_an_error() {
        let mut model = Ramp::new(0.0);
        let inputs = InputBundle::current(0.0);
        let mut solver = EventSolver::new(SolverOptions {
            max_steps: 3,
            ..SolverOptions::default()
        })
        .unwrap();
        let err = solver
            .solve(&mut model, &4.0, &request(&inputs, 3600.0))
            .unwrap_err();
        assert!(matches!(err, SimError::ConvergenceFailed { .. }));
    }

    #[test]
    fn invalid_options_rejected() {
        let opts = SolverOptions {
            max_dt_s: 0.0,
            ..SolverOptions::default()
        };
        assert!(EventSolver::new(opts).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn event_time_is_bracketed(v_min in 1.0_f64..3.9, amps in 0.5_f64..5.0) {
                let mut model = Ramp::new(v_min);
                let inputs = InputBundle::current(amps);
                let mut solver = EventSolver::default();
                let out = solver.solve(&mut model, &4.0, &request(&inputs, 3600.0)).unwrap();

                // Voltage falls at 0.01 V per coulomb.
                let expected = (4.0 - v_min) / (0.01 * amps);
                let t_hit = *out.solution.time_s.last().unwrap();
                prop_assert_eq!(out.solution.termination.event_name(), Some(MINIMUM_VOLTAGE));
                prop_assert!(t_hit >= expected - 1e-6, "t_hit = {}, expected = {}", t_hit, expected);
                prop_assert!(t_hit <= expected + 1e-3 + 1e-6);
            }
        }
    }
}
