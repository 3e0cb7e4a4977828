//! Termination events and the experiment event synthesizer.
//!
//! An event is a scalar function of the model variables and the active
//! inputs; it fires when that value crosses zero during a step.

use cf_experiment::{CompiledStep, Direction, InputBundle, events as experiment};

use crate::model::Variables;

pub const MINIMUM_VOLTAGE: &str = "Minimum voltage";
pub const MAXIMUM_VOLTAGE: &str = "Maximum voltage";

/// Which zero crossings fire an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// Positive to non-positive. A value already at or below zero when a
    /// step starts fires immediately.
    Falling,
    /// Any sign change.
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// Intrinsic safety limit: `V - volts`.
    MinimumVoltage { volts: f64 },
    /// Intrinsic safety limit: `volts - V`.
    MaximumVoltage { volts: f64 },
    /// `I - |I_cut|`, active when the inputs carry a current cut-off.
    CurrentCutoffPositive,
    /// `I + |I_cut|`, active when the inputs carry a current cut-off.
    CurrentCutoffNegative,
    /// `V - V_cut`, active when the inputs carry a voltage cut-off.
    VoltageCutoff,
}

impl EventKind {
    pub fn crossing(&self) -> Crossing {
        match self {
            Self::MinimumVoltage { .. } | Self::MaximumVoltage { .. } => Crossing::Falling,
            _ => Crossing::Either,
        }
    }

    /// Event value, or `None` when the event does not apply to `inputs`.
    pub fn value(&self, vars: &Variables, inputs: &InputBundle) -> Option<f64> {
        match *self {
            Self::MinimumVoltage { volts } => Some(vars.voltage_v - volts),
            Self::MaximumVoltage { volts } => Some(volts - vars.voltage_v),
            Self::CurrentCutoffPositive => inputs
                .current_cutoff_a
                .map(|cut| vars.current_a - cut.abs()),
            Self::CurrentCutoffNegative => inputs
                .current_cutoff_a
                .map(|cut| vars.current_a + cut.abs()),
            Self::VoltageCutoff => inputs.voltage_cutoff_v.map(|cut| vars.voltage_v - cut),
        }
    }

    /// Whether the value moved across zero between two evaluations.
    pub fn crossed(&self, before: Option<f64>, after: Option<f64>) -> bool {
        let (Some(before), Some(after)) = (before, after) else {
            return false;
        };
        match self.crossing() {
            Crossing::Falling => before > 0.0 && after <= 0.0,
            Crossing::Either => (before > 0.0 && after <= 0.0) || (before < 0.0 && after >= 0.0),
        }
    }

    /// Whether the value already sits past its limit at the start of a step.
    ///
    /// Safety limits are past when non-positive. A voltage cut-off is past
    /// once the voltage is on the far side for the drive direction; a current
    /// cut-off once the current magnitude is at or below it, reported on the
    /// event for the current's sign.
    pub fn tripped(&self, value: Option<f64>, inputs: &InputBundle) -> bool {
        let Some(v) = value else {
            return false;
        };
        match *self {
            Self::MinimumVoltage { .. } | Self::MaximumVoltage { .. } => v <= 0.0,
            Self::VoltageCutoff => match inputs.direction() {
                Some(Direction::Discharge) => v <= 0.0,
                Some(Direction::Charge) => v >= 0.0,
                None => false,
            },
            Self::CurrentCutoffPositive => inputs
                .current_cutoff_a
                .is_some_and(|cut| v <= 0.0 && v >= -cut.abs()),
            Self::CurrentCutoffNegative => inputs
                .current_cutoff_a
                .is_some_and(|cut| v >= 0.0 && v < cut.abs()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub kind: EventKind,
}

/// Insertion-ordered set of events keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRegistry {
    events: Vec<Event>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event unless one with the same name exists.
    ///
    /// Returns `true` if the event was added. An existing event is never
    /// replaced.
    pub fn register(&mut self, name: impl Into<String>, kind: EventKind) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.events.push(Event { name, kind });
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Evaluate every event, in registration order.
    pub fn evaluate(&self, vars: &Variables, inputs: &InputBundle) -> Vec<Option<f64>> {
        self.events
            .iter()
            .map(|e| e.kind.value(vars, inputs))
            .collect()
    }

    /// First event that crossed zero between two evaluations.
    pub fn first_crossed(&self, before: &[Option<f64>], after: &[Option<f64>]) -> Option<&Event> {
        self.events
            .iter()
            .zip(before.iter().zip(after))
            .find(|(e, (b, a))| e.kind.crossed(**b, **a))
            .map(|(e, _)| e)
    }

    /// First event already past its limit.
    pub fn first_tripped(&self, values: &[Option<f64>], inputs: &InputBundle) -> Option<&Event> {
        self.events
            .iter()
            .zip(values)
            .find(|(e, v)| e.kind.tripped(**v, inputs))
            .map(|(e, _)| e)
    }
}

/// Register the experiment cut-off events required by `steps`.
///
/// A current cut-off needs both current events, a voltage cut-off needs the
/// voltage event. Returns the number of events newly added.
pub fn register_experiment_events(registry: &mut EventRegistry, steps: &[CompiledStep]) -> usize {
    let mut added = 0;
    for step in steps {
        if step.bundle.current_cutoff_a.is_some() {
            added += usize::from(registry.register(
                experiment::CURRENT_CUTOFF_POSITIVE,
                EventKind::CurrentCutoffPositive,
            ));
            added += usize::from(registry.register(
                experiment::CURRENT_CUTOFF_NEGATIVE,
                EventKind::CurrentCutoffNegative,
            ));
        }
        if step.bundle.voltage_cutoff_v.is_some() {
            added += usize::from(
                registry.register(experiment::VOLTAGE_CUTOFF, EventKind::VoltageCutoff),
            );
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(current_a: f64, voltage_v: f64) -> Variables {
        Variables {
            current_a,
            voltage_v,
            state_of_charge: 0.5,
        }
    }

    fn step(index: usize, bundle: InputBundle) -> CompiledStep {
        CompiledStep {
            index,
            instruction: String::new(),
            bundle,
            duration_s: 1.0,
            time_budget: 1.0,
            intended_events: Vec::new(),
        }
    }

    #[test]
    fn register_is_idempotent() {
        let mut reg = EventRegistry::new();
        assert!(reg.register(MINIMUM_VOLTAGE, EventKind::MinimumVoltage { volts: 3.0 }));
        assert!(!reg.register(MINIMUM_VOLTAGE, EventKind::MinimumVoltage { volts: 2.0 }));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.get(MINIMUM_VOLTAGE).map(|e| e.kind),
            Some(EventKind::MinimumVoltage { volts: 3.0 })
        );
    }

    #[test]
    fn synthesizer_adds_only_needed_events_once() {
        let mut reg = EventRegistry::new();
        reg.register(MINIMUM_VOLTAGE, EventKind::MinimumVoltage { volts: 3.0 });

        let steps = [
            step(0, InputBundle::current(1.0)),
            step(1, InputBundle::current(-1.0).with_voltage_cutoff(4.1)),
            step(2, InputBundle::current(-0.5).with_voltage_cutoff(4.1)),
        ];
        assert_eq!(register_experiment_events(&mut reg, &steps), 1);
        assert_eq!(reg.len(), 2);
        assert!(reg.contains(experiment::VOLTAGE_CUTOFF));
        assert!(!reg.contains(experiment::CURRENT_CUTOFF_POSITIVE));

        // Second registration pass is a no-op.
        assert_eq!(register_experiment_events(&mut reg, &steps), 0);
        assert_eq!(reg.len(), 2);
        assert!(reg.contains(MINIMUM_VOLTAGE));
    }

    #[test]
    fn experiment_events_inactive_without_cutoff() {
        let inputs = InputBundle::current(1.0);
        let v = vars(1.0, 3.7);
        assert_eq!(EventKind::VoltageCutoff.value(&v, &inputs), None);
        assert_eq!(EventKind::CurrentCutoffPositive.value(&v, &inputs), None);
        assert!(!EventKind::VoltageCutoff.crossed(None, None));
    }

    #[test]
    fn voltage_cutoff_fires_in_either_direction() {
        let kind = EventKind::VoltageCutoff;
        let inputs = InputBundle::current(-1.0).with_voltage_cutoff(4.1);
        let below = kind.value(&vars(-1.0, 4.0), &inputs);
        let above = kind.value(&vars(-1.0, 4.2), &inputs);
        assert!(kind.crossed(below, above));
        assert!(kind.crossed(above, below));
        assert!(!kind.crossed(below, below));
    }

    #[test]
    fn decaying_charge_current_fires_negative_event_only() {
        let inputs = InputBundle::voltage(4.1).with_current_cutoff(0.05);
        let early = vars(-0.8, 4.1);
        let late = vars(-0.04, 4.1);
        let pos = EventKind::CurrentCutoffPositive;
        let neg = EventKind::CurrentCutoffNegative;
        assert!(!pos.crossed(pos.value(&early, &inputs), pos.value(&late, &inputs)));
        assert!(neg.crossed(neg.value(&early, &inputs), neg.value(&late, &inputs)));
    }

    #[test]
    fn safety_limit_trips_when_already_past() {
        let kind = EventKind::MinimumVoltage { volts: 3.0 };
        let inputs = InputBundle::current(1.0);
        assert!(kind.tripped(kind.value(&vars(1.0, 2.9), &inputs), &inputs));
        assert!(!kind.tripped(kind.value(&vars(1.0, 3.1), &inputs), &inputs));
        // Recovering above the limit is not a crossing.
        assert!(!kind.crossed(Some(-0.1), Some(0.1)));
    }

    #[test]
    fn voltage_cutoff_trips_on_the_side_the_drive_approaches() {
        let kind = EventKind::VoltageCutoff;
        let discharge = InputBundle::current(1.0).with_voltage_cutoff(3.5);
        assert!(kind.tripped(kind.value(&vars(1.0, 3.49), &discharge), &discharge));
        assert!(!kind.tripped(kind.value(&vars(1.0, 3.6), &discharge), &discharge));

        let charge = InputBundle::current(-1.0).with_voltage_cutoff(4.1);
        assert!(kind.tripped(kind.value(&vars(-1.0, 4.1), &charge), &charge));
        assert!(!kind.tripped(kind.value(&vars(-1.0, 4.0), &charge), &charge));

        // Rest has no direction to approach from.
        let rest = InputBundle::current(0.0).with_voltage_cutoff(3.5);
        assert!(!kind.tripped(kind.value(&vars(0.0, 3.4), &rest), &rest));
    }

    #[test]
    fn current_cutoff_trips_on_the_event_for_its_sign() {
        let inputs = InputBundle::voltage(4.1).with_current_cutoff(0.05);
        let pos = EventKind::CurrentCutoffPositive;
        let neg = EventKind::CurrentCutoffNegative;

        let small_charge = vars(-0.02, 4.1);
        assert!(neg.tripped(neg.value(&small_charge, &inputs), &inputs));
        assert!(!pos.tripped(pos.value(&small_charge, &inputs), &inputs));

        let small_discharge = vars(0.02, 4.1);
        assert!(pos.tripped(pos.value(&small_discharge, &inputs), &inputs));
        assert!(!neg.tripped(neg.value(&small_discharge, &inputs), &inputs));

        let large = vars(-0.8, 4.1);
        assert!(!neg.tripped(neg.value(&large, &inputs), &inputs));
        assert!(!pos.tripped(pos.value(&large, &inputs), &inputs));
    }

    #[test]
    fn first_crossed_uses_registration_order() {
        let mut reg = EventRegistry::new();
        reg.register(MINIMUM_VOLTAGE, EventKind::MinimumVoltage { volts: 3.0 });
        reg.register(experiment::VOLTAGE_CUTOFF, EventKind::VoltageCutoff);
        let inputs = InputBundle::current(1.0).with_voltage_cutoff(3.0);

        let before = reg.evaluate(&vars(1.0, 3.2), &inputs);
        let after = reg.evaluate(&vars(1.0, 2.9), &inputs);
        let fired = reg.first_crossed(&before, &after).map(|e| e.name.as_str());
        assert_eq!(fired, Some(MINIMUM_VOLTAGE));
    }
}
