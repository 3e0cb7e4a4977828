//! Experiments: ordered steps, grouped into cycles.

use cf_core::ParameterValues;
use cf_core::units::{Time, as_seconds, s};

use crate::compile::{CompiledStep, SolverInputs, compile_step};
use crate::error::{CompileError, ExperimentError, ParseError};
use crate::parse::parse_duration;
use crate::step::Step;
use crate::timescale::Timescale;

/// Default spacing of recorded solution points.
pub const DEFAULT_PERIOD_S: f64 = 60.0;

/// An immutable sequence of operating steps.
///
/// Every instruction is parsed when the experiment is built, so a malformed
/// experiment never reaches the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    steps: Vec<Step>,
    cycle_lengths: Vec<usize>,
    period: Time,
}

impl Experiment {
    /// Build from a flat list of instructions; each instruction is its own cycle.
    pub fn new<I, S>(instructions: I) -> Result<Self, ExperimentError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_cycles(instructions.into_iter().map(|i| [i]))
    }

    /// Build from cycles of instructions, kept in order.
    pub fn from_cycles<C, I, S>(cycles: C) -> Result<Self, ExperimentError>
    where
        C: IntoIterator<Item = I>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut steps = Vec::new();
        let mut cycle_lengths = Vec::new();
        for (cycle, instructions) in cycles.into_iter().enumerate() {
            let before = steps.len();
            for instruction in instructions {
                steps.push(Step::parse(instruction.as_ref())?);
            }
            let len = steps.len() - before;
            if len == 0 {
                return Err(ExperimentError::EmptyCycle { cycle });
            }
            cycle_lengths.push(len);
        }
        if steps.is_empty() {
            return Err(ExperimentError::Empty);
        }
        Ok(Self {
            steps,
            cycle_lengths,
            period: s(DEFAULT_PERIOD_S),
        })
    }

    /// Repeat one cycle `count` times.
    pub fn repeated<I, S>(cycle: I, count: usize) -> Result<Self, ExperimentError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cycle: Vec<String> = cycle.into_iter().map(|i| i.as_ref().to_string()).collect();
        Self::from_cycles(std::iter::repeat_n(cycle, count))
    }

    /// Set the recording period, e.g. `"10 seconds"`.
    pub fn with_period(mut self, period: &str) -> Result<Self, ParseError> {
        self.period = parse_duration(period)?;
        Ok(self)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Construction rejects empty step lists, so this is always false.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn period(&self) -> Time {
        self.period
    }

    /// Steps grouped by cycle.
    pub fn cycles(&self) -> impl Iterator<Item = &[Step]> {
        let mut start = 0;
        self.cycle_lengths.iter().map(move |&len| {
            let cycle = &self.steps[start..start + len];
            start += len;
            cycle
        })
    }

    pub fn cycle_count(&self) -> usize {
        self.cycle_lengths.len()
    }

    /// Compile every step against `params`, converting budgets with `timescale`.
    ///
    /// Fails on the first step that cannot be compiled.
    pub fn compile(
        &self,
        params: &ParameterValues,
        timescale: Timescale,
    ) -> Result<CompiledExperiment, CompileError> {
        let period_s = as_seconds(self.period);
        if !period_s.is_finite() || period_s <= 0.0 {
            return Err(CompileError::InvalidPeriod { period_s });
        }

        let steps = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let (bundle, duration_s, intended_events) = compile_step(index, step, params)?;
                Ok(CompiledStep {
                    index,
                    instruction: step.instruction().to_string(),
                    bundle,
                    duration_s,
                    time_budget: timescale.to_dimensionless(duration_s),
                    intended_events,
                })
            })
            .collect::<Result<Vec<_>, CompileError>>()?;

        Ok(CompiledExperiment {
            steps,
            timescale,
            period: timescale.to_dimensionless(period_s),
        })
    }
}

/// An experiment resolved against one model's parameters and timescale.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExperiment {
    steps: Vec<CompiledStep>,
    timescale: Timescale,
    period: f64,
}

impl CompiledExperiment {
    pub fn steps(&self) -> &[CompiledStep] {
        &self.steps
    }

    pub fn timescale(&self) -> Timescale {
        self.timescale
    }

    /// Recording period in dimensionless time.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Labelled solver inputs, one map per step.
    pub fn inputs(&self) -> Vec<SolverInputs> {
        self.steps.iter().map(|s| s.bundle.inputs()).collect()
    }

    /// Dimensionless time budget per step.
    pub fn times(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.time_budget).collect()
    }
}
