//! Step and experiment solutions.

use std::fmt;

use cf_experiment::{InputBundle, Timescale};
use serde::{Serialize, Serializer};

use crate::model::Variables;

/// Why a solve stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The step ran for its whole time budget.
    FinalTime,
    /// The named event fired first.
    Event(String),
}

impl Termination {
    pub fn event_name(&self) -> Option<&str> {
        match self {
            Self::FinalTime => None,
            Self::Event(name) => Some(name),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FinalTime => f.write_str("final time"),
            Self::Event(name) => write!(f, "event: {name}"),
        }
    }
}

impl Serialize for Termination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Recorded trajectory of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub step_index: usize,
    /// Dimensionless time
    pub t: Vec<f64>,
    /// Time (seconds)
    pub time_s: Vec<f64>,
    pub current_a: Vec<f64>,
    pub voltage_v: Vec<f64>,
    pub state_of_charge: Vec<f64>,
    pub termination: Termination,
}

impl Solution {
    pub fn new(step_index: usize) -> Self {
        Self {
            step_index,
            t: Vec::new(),
            time_s: Vec::new(),
            current_a: Vec::new(),
            voltage_v: Vec::new(),
            state_of_charge: Vec::new(),
            termination: Termination::FinalTime,
        }
    }

    pub fn push(&mut self, t: f64, timescale: Timescale, vars: &Variables) {
        self.t.push(t);
        self.time_s.push(timescale.to_seconds(t));
        self.current_a.push(vars.current_a);
        self.voltage_v.push(vars.voltage_v);
        self.state_of_charge.push(vars.state_of_charge);
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Last recorded dimensionless time.
    pub fn t_end(&self) -> Option<f64> {
        self.t.last().copied()
    }

    /// Elapsed wall-clock time covered by this step.
    pub fn duration_s(&self) -> f64 {
        match (self.time_s.first(), self.time_s.last()) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        }
    }
}

/// Aggregate of all steps solved in one experiment run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExperimentSolution {
    steps: Vec<Solution>,
    inputs: Vec<InputBundle>,
    termination: Option<Termination>,
    aborted_at: Option<usize>,
}

impl ExperimentSolution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a solved step; its termination becomes the experiment's.
    pub fn push(&mut self, solution: Solution, inputs: InputBundle) {
        self.termination = Some(solution.termination.clone());
        self.steps.push(solution);
        self.inputs.push(inputs);
    }

    pub(crate) fn mark_aborted(&mut self, step: usize) {
        self.aborted_at = Some(step);
    }

    /// Termination of the last step actually solved.
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub fn steps(&self) -> &[Solution] {
        &self.steps
    }

    /// Input bundle used by each solved step.
    pub fn inputs(&self) -> &[InputBundle] {
        &self.inputs
    }

    /// Index of the step stopped by an unintended event.
    pub fn aborted_at(&self) -> Option<usize> {
        self.aborted_at
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted_at.is_some()
    }

    pub fn time_s(&self) -> Vec<f64> {
        self.concat(|s| &s.time_s)
    }

    pub fn current_a(&self) -> Vec<f64> {
        self.concat(|s| &s.current_a)
    }

    pub fn voltage_v(&self) -> Vec<f64> {
        self.concat(|s| &s.voltage_v)
    }

    pub fn state_of_charge(&self) -> Vec<f64> {
        self.concat(|s| &s.state_of_charge)
    }

    fn concat(&self, field: impl Fn(&Solution) -> &Vec<f64>) -> Vec<f64> {
        self.steps
            .iter()
            .flat_map(|s| field(s).iter().copied())
            .collect()
    }
}
