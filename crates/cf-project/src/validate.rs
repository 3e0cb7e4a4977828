//! Experiment file validation logic.

use cf_core::units::as_seconds;
use cf_experiment::{ParseError, parse_duration, parse_instruction};

use crate::schema::{ExperimentFile, LATEST_VERSION, SolverDef};

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Experiment has no steps")]
    NoSteps,

    #[error("Invalid {field}: {source}")]
    Instruction {
        field: String,
        #[source]
        source: ParseError,
    },
}

fn invalid(field: impl Into<String>, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_experiment_file(file: &ExperimentFile) -> Result<(), ValidationError> {
    if file.version == 0 || file.version > LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: file.version,
        });
    }

    if file.name.trim().is_empty() {
        return Err(invalid("name", &file.name, "must not be empty"));
    }

    for (name, value) in file.cell.parameters.iter() {
        if !value.is_finite() {
            return Err(invalid(
                format!("cell.parameters[\"{name}\"]"),
                value,
                "must be finite",
            ));
        }
    }

    let period =
        parse_duration(&file.experiment.period).map_err(|source| ValidationError::Instruction {
            field: "experiment.period".to_string(),
            source,
        })?;
    if as_seconds(period) <= 0.0 {
        return Err(invalid(
            "experiment.period",
            &file.experiment.period,
            "must be positive",
        ));
    }

    if file.experiment.cycles.iter().all(|c| c.steps.is_empty()) {
        return Err(ValidationError::NoSteps);
    }
    for (i, cycle) in file.experiment.cycles.iter().enumerate() {
        if cycle.repeat == 0 {
            return Err(invalid(
                format!("experiment.cycles[{i}].repeat"),
                cycle.repeat,
                "must be at least 1",
            ));
        }
        if cycle.steps.is_empty() {
            return Err(invalid(
                format!("experiment.cycles[{i}].steps"),
                "[]",
                "must contain at least one step",
            ));
        }
        for (j, step) in cycle.steps.iter().enumerate() {
            parse_instruction(step).map_err(|source| ValidationError::Instruction {
                field: format!("experiment.cycles[{i}].steps[{j}]"),
                source,
            })?;
        }
    }

    validate_solver(&file.solver)
}

fn validate_solver(solver: &SolverDef) -> Result<(), ValidationError> {
    if !(solver.max_dt_s.is_finite() && solver.max_dt_s > 0.0) {
        return Err(invalid(
            "solver.max_dt_s",
            solver.max_dt_s,
            "must be positive and finite",
        ));
    }
    if !(solver.event_tol_s.is_finite() && solver.event_tol_s > 0.0) {
        return Err(invalid(
            "solver.event_tol_s",
            solver.event_tol_s,
            "must be positive and finite",
        ));
    }
    if solver.max_steps == 0 {
        return Err(invalid("solver.max_steps", solver.max_steps, "must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CellDef, CycleDef, ExperimentDef, RunnerDef};

    fn file() -> ExperimentFile {
        ExperimentFile {
            version: LATEST_VERSION,
            name: "Charge-discharge".to_string(),
            cell: CellDef::default(),
            experiment: ExperimentDef {
                period: "1 minute".to_string(),
                cycles: vec![CycleDef {
                    repeat: 2,
                    steps: vec![
                        "Discharge at 1 A for 10 minutes".to_string(),
                        "Charge at C/2 until 4.1 V".to_string(),
                    ],
                }],
            },
            solver: SolverDef::default(),
            runner: RunnerDef::default(),
        }
    }

    #[test]
    fn accepts_valid_file() {
        validate_experiment_file(&file()).unwrap();
    }

    #[test]
    fn rejects_future_version() {
        let mut f = file();
        f.version = LATEST_VERSION + 1;
        assert!(matches!(
            validate_experiment_file(&f),
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn rejects_blank_name() {
        let mut f = file();
        f.name = "  ".to_string();
        assert!(matches!(
            validate_experiment_file(&f),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "name"
        ));
    }

    #[test]
    fn rejects_zero_repeat() {
        let mut f = file();
        f.experiment.cycles[0].repeat = 0;
        let err = validate_experiment_file(&f).unwrap_err();
        assert!(err.to_string().contains("experiment.cycles[0].repeat"));
    }

    #[test]
    fn reports_bad_instruction_location() {
        let mut f = file();
        f.experiment.cycles[0].steps[1] = "Charge at 1 A until 4.1 W".to_string();
        match validate_experiment_file(&f) {
            Err(ValidationError::Instruction { field, source }) => {
                assert_eq!(field, "experiment.cycles[0].steps[1]");
                assert_eq!(source.column, 25);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_experiment() {
        let mut f = file();
        f.experiment.cycles.clear();
        assert!(matches!(
            validate_experiment_file(&f),
            Err(ValidationError::NoSteps)
        ));
    }

    #[test]
    fn rejects_bad_solver_settings() {
        let mut f = file();
        f.solver.event_tol_s = 0.0;
        assert!(validate_experiment_file(&f).is_err());

        let mut f = file();
        f.solver.max_dt_s = f64::NAN;
        assert!(validate_experiment_file(&f).is_err());
    }

    #[test]
    fn rejects_non_finite_parameter() {
        let mut f = file();
        f.cell.parameters.set("Cell capacity [A.h]", f64::INFINITY);
        assert!(validate_experiment_file(&f).is_err());
    }

    #[test]
    fn rejects_zero_period() {
        let mut f = file();
        f.experiment.period = "0 seconds".to_string();
        assert!(validate_experiment_file(&f).is_err());
    }
}
