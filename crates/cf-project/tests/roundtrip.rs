use cf_core::ParameterValues;
use cf_project::schema::*;
use cf_project::{load_json, load_yaml, save_json, save_yaml, validate_experiment_file};

fn sample() -> ExperimentFile {
    let parameters = ParameterValues::new().with("Cell capacity [A.h]", 0.68);
    ExperimentFile {
        version: LATEST_VERSION,
        name: "Roundtrip".to_string(),
        cell: CellDef { parameters },
        experiment: ExperimentDef {
            period: "30 seconds".to_string(),
            cycles: vec![CycleDef {
                repeat: 2,
                steps: vec![
                    "Discharge at C/20 for 1 hour".to_string(),
                    "Charge at 1 A until 4.1 V".to_string(),
                    "Hold at 4.1 V until 50 mA".to_string(),
                ],
            }],
        },
        solver: SolverDef {
            integrator: IntegratorDef::ForwardEuler,
            ..SolverDef::default()
        },
        runner: RunnerDef {
            abort_log_level: LogLevelDef::Info,
        },
    }
}

#[test]
fn roundtrip_yaml() {
    let file = sample();
    validate_experiment_file(&file).unwrap();

    let path = std::env::temp_dir().join("cf_project_roundtrip.yaml");
    save_yaml(&path, &file).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(file, loaded);
}

#[test]
fn roundtrip_json() {
    let file = sample();
    let path = std::env::temp_dir().join("cf_project_roundtrip.json");
    save_json(&path, &file).unwrap();
    let loaded = load_json(&path).unwrap();

    assert_eq!(file, loaded);
}

#[test]
fn minimal_yaml_fills_defaults() {
    let yaml = r#"
version: 1
name: Minimal
experiment:
  cycles:
    - steps: ["Rest for 1 hour"]
"#;
    let file: ExperimentFile = serde_yaml::from_str(yaml).unwrap();
    validate_experiment_file(&file).unwrap();

    assert_eq!(file.experiment.period, "1 minute");
    assert_eq!(file.experiment.cycles[0].repeat, 1);
    assert!(file.cell.parameters.is_empty());
    assert_eq!(file.solver, SolverDef::default());
    assert_eq!(file.runner.abort_log_level, LogLevelDef::Warn);
}

#[test]
fn cell_parameters_read_as_a_plain_map() {
    let yaml = r#"
version: 1
name: Big cell
cell:
  parameters:
    "Cell capacity [A.h]": 5.0
    "Series resistance [Ohm]": 0.01
experiment:
  cycles:
    - steps: ["Discharge at 1 C for 1 minute"]
"#;
    let file: ExperimentFile = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(file.cell.parameters.len(), 2);
    assert_eq!(file.cell.parameters.get("Cell capacity [A.h]"), Some(5.0));

    let sim = file.simulation().unwrap();
    assert_eq!(sim.experiment_inputs()[0]["Current input [A]"], 5.0);

    let text = serde_yaml::to_string(&file).unwrap();
    let back: ExperimentFile = serde_yaml::from_str(&text).unwrap();
    assert_eq!(back.cell.parameters, file.cell.parameters);
}

#[test]
fn invalid_file_is_not_saved() {
    let mut file = sample();
    file.experiment.cycles[0].steps[0] = "Discharge at 1 A".to_string();
    let path = std::env::temp_dir().join("cf_project_invalid.yaml");
    assert!(save_yaml(&path, &file).is_err());
}
