//! Experiment file schema definitions.

use cf_core::ParameterValues;
use serde::{Deserialize, Serialize};

/// Current experiment file format version.
pub const LATEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentFile {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub cell: CellDef,
    pub experiment: ExperimentDef,
    #[serde(default)]
    pub solver: SolverDef,
    #[serde(default)]
    pub runner: RunnerDef,
}

/// Overrides applied on top of the reference cell's default parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CellDef {
    #[serde(default)]
    pub parameters: ParameterValues,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentDef {
    /// Recording period, written as a duration ("1 minute", "30 seconds").
    #[serde(default = "default_period")]
    pub period: String,
    pub cycles: Vec<CycleDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleDef {
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolverDef {
    #[serde(default = "default_max_dt_s")]
    pub max_dt_s: f64,
    #[serde(default = "default_event_tol_s")]
    pub event_tol_s: f64,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub integrator: IntegratorDef,
}

impl Default for SolverDef {
    fn default() -> Self {
        Self {
            max_dt_s: default_max_dt_s(),
            event_tol_s: default_event_tol_s(),
            max_steps: default_max_steps(),
            integrator: IntegratorDef::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorDef {
    #[default]
    Rk4,
    ForwardEuler,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunnerDef {
    #[serde(default)]
    pub abort_log_level: LogLevelDef,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevelDef {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

fn default_period() -> String {
    "1 minute".to_string()
}

fn default_repeat() -> usize {
    1
}

fn default_max_dt_s() -> f64 {
    10.0
}

fn default_event_tol_s() -> f64 {
    1e-3
}

fn default_max_steps() -> usize {
    1_000_000
}
