//! cf-project: experiment file format and validation.

pub mod resolve;
pub mod schema;
pub mod validate;

pub use schema::*;
pub use validate::{ValidationError, validate_experiment_file};

use std::path::Path;

use cf_experiment::ExperimentError;
use cf_sim::SimError;

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Experiment error: {0}")]
    Experiment(#[from] ExperimentError),

    #[error("Simulation setup error: {0}")]
    Sim(#[from] SimError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &Path) -> ProjectResult<ExperimentFile> {
    let content = std::fs::read_to_string(path)?;
    let file: ExperimentFile = serde_yaml::from_str(&content)?;
    validate_experiment_file(&file)?;
    Ok(file)
}

pub fn save_yaml(path: &Path, file: &ExperimentFile) -> ProjectResult<()> {
    validate_experiment_file(file)?;
    let content = serde_yaml::to_string(file)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ProjectResult<ExperimentFile> {
    let content = std::fs::read_to_string(path)?;
    let file: ExperimentFile = serde_json::from_str(&content)?;
    validate_experiment_file(&file)?;
    Ok(file)
}

pub fn save_json(path: &Path, file: &ExperimentFile) -> ProjectResult<()> {
    validate_experiment_file(file)?;
    let content = serde_json::to_string_pretty(file)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load by extension: `.json` as JSON, anything else as YAML.
pub fn load(path: &Path) -> ProjectResult<ExperimentFile> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => load_json(path),
        _ => load_yaml(path),
    }
}
