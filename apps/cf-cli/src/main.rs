use clap::{Parser, Subcommand};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use cf_core::units::{as_amps, as_seconds, as_volts, as_watts};
use cf_experiment::{Drive, ParseError, Step, StepEnd, Threshold, parse_instruction};
use cf_project::{ExperimentFile, ProjectError};
use cf_sim::{CellModel, ExperimentSolution, RunError, RunProgress, RunState};
use tracing::info;

#[derive(Parser)]
#[command(name = "cf-cli")]
#[command(about = "CellFlow CLI - battery cycling experiments on a lumped cell model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a single operating instruction
    Parse {
        /// Instruction text, e.g. "Charge at 1 A until 4.1 V"
        instruction: String,
    },
    /// Validate experiment file syntax and instructions
    Validate {
        /// Path to the experiment file (YAML or JSON)
        path: PathBuf,
    },
    /// Show the solver inputs each step compiles to
    Compile {
        /// Path to the experiment file (YAML or JSON)
        path: PathBuf,
    },
    /// Run an experiment
    Run {
        /// Path to the experiment file (YAML or JSON)
        path: PathBuf,
        /// Write the solution as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the full solution as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Run(#[from] Box<RunError>),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type CliResult<T> = Result<T, CliError>;

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { instruction } => cmd_parse(&instruction),
        Commands::Validate { path } => cmd_validate(&path),
        Commands::Compile { path } => cmd_compile(&path),
        Commands::Run { path, output, json } => {
            cmd_run(&path, output.as_deref(), json.as_deref())
        }
    }
}

fn cmd_parse(instruction: &str) -> CliResult<()> {
    let step = parse_instruction(instruction)?;
    print_step(&step);
    Ok(())
}

fn print_step(step: &Step) {
    println!("Instruction: {}", step.instruction());
    println!("  Operation: {}", step.operation());
    if let Some(drive) = step.drive() {
        println!("  Drive:     {}", describe_drive(drive));
    }
    match step.end() {
        StepEnd::For(t) => println!("  Duration:  {} s", as_seconds(t)),
        StepEnd::Until(threshold) => println!("  Until:     {}", describe_threshold(threshold)),
    }
}

fn describe_drive(drive: Drive) -> String {
    match drive {
        Drive::CRate(rate) => format!("{rate} C"),
        Drive::Current(i) => format!("{} A", as_amps(i)),
        Drive::Voltage(v) => format!("{} V", as_volts(v)),
        Drive::Power(p) => format!("{} W", as_watts(p)),
    }
}

fn describe_threshold(threshold: Threshold) -> String {
    match threshold {
        Threshold::CRate(rate) => format!("{rate} C"),
        Threshold::Current(i) => format!("{} A", as_amps(i)),
        Threshold::Voltage(v) => format!("{} V", as_volts(v)),
    }
}

fn cmd_validate(path: &Path) -> CliResult<()> {
    println!("Validating experiment file: {}", path.display());
    let file = cf_project::load(path)?;
    let experiment = file.experiment()?;
    println!(
        "✓ Experiment '{}' is valid ({} steps in {} cycles)",
        file.name,
        experiment.len(),
        experiment.cycle_count()
    );
    Ok(())
}

fn cmd_compile(path: &Path) -> CliResult<()> {
    let file = cf_project::load(path)?;
    let sim = file.simulation()?;
    let compiled = sim.compiled();

    println!("Experiment: {}", file.name);
    println!(
        "  Timescale: {} s, period: {} s",
        compiled.timescale().seconds(),
        compiled.timescale().to_seconds(compiled.period())
    );
    let events: Vec<&str> = sim.model().events().names().collect();
    println!("  Events: {}", events.join(", "));

    for step in compiled.steps() {
        println!("\n[{}] {}", step.index, step.instruction);
        for (label, value) in step.bundle.inputs() {
            println!("    {label:<24} = {value}");
        }
        println!(
            "    time budget              = {} s ({:.6} dimensionless)",
            step.duration_s, step.time_budget
        );
        if !step.intended_events.is_empty() {
            println!("    ends on                  = {}", step.intended_events.join(", "));
        }
    }
    Ok(())
}

fn cmd_run(path: &Path, output: Option<&Path>, json: Option<&Path>) -> CliResult<()> {
    let file: ExperimentFile = cf_project::load(path)?;
    let mut sim = file.simulation()?;
    let step_count = sim.compiled().steps().len();
    println!("Running experiment '{}' ({} steps)", file.name, step_count);

    let started = Instant::now();
    let result = sim
        .solve_with_progress(&mut |p: RunProgress| render_progress(&p))
        .cloned();
    clear_progress_line();
    info!(elapsed_s = started.elapsed().as_secs_f64(), "run finished");

    let solution = export_run(result, output, json)?;
    print_summary(&solution);
    println!("  Wall time: {:.3}s", started.elapsed().as_secs_f64());
    Ok(())
}

/// Write the requested exports, including the completed steps of a failed run.
fn export_run(
    result: Result<ExperimentSolution, RunError>,
    output: Option<&Path>,
    json: Option<&Path>,
) -> CliResult<ExperimentSolution> {
    let solution = match &result {
        Ok(solution) => solution,
        Err(err) => {
            eprintln!("Run failed at step {}; exporting completed steps", err.step);
            &err.partial
        }
    };

    if let Some(path) = output {
        write_csv(path, solution)?;
        println!("✓ Wrote {} points to {}", solution.time_s().len(), path.display());
    }
    if let Some(path) = json {
        let writer = BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer_pretty(writer, solution)?;
        println!("✓ Wrote solution to {}", path.display());
    }

    result.map_err(|err| CliError::Run(Box::new(err)))
}

fn render_progress(progress: &RunProgress) {
    let line = match progress.state {
        RunState::Running(i) => format!(
            "step {}/{}  t={:.1}s",
            i + 1,
            progress.step_count,
            progress.sim_time_s
        ),
        _ => return,
    };
    eprint!("\r{line:<60}");
    let _ = io::stderr().flush();
}

fn clear_progress_line() {
    eprint!("\r{}\r", " ".repeat(60));
    let _ = io::stderr().flush();
}

fn print_summary(solution: &ExperimentSolution) {
    println!("\nRun Summary:");
    if let Some(termination) = solution.termination() {
        println!("  Termination: {termination}");
    }
    if let Some(step) = solution.aborted_at() {
        println!("  Stopped early at step {step}");
    }
    println!("  Steps solved: {}", solution.steps().len());
    for step in solution.steps() {
        println!(
            "    [{}] {:>10.1} s  {}",
            step.step_index,
            step.duration_s(),
            step.termination
        );
    }
    if let (Some(v), Some(soc)) = (
        solution.voltage_v().last(),
        solution.state_of_charge().last(),
    ) {
        println!("  Final voltage: {v:.4} V, state of charge: {soc:.4}");
    }
}

fn write_csv(path: &Path, solution: &ExperimentSolution) -> io::Result<()> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    writeln!(out, "step,time_s,current_a,voltage_v,state_of_charge")?;
    for step in solution.steps() {
        for k in 0..step.len() {
            writeln!(
                out,
                "{},{},{},{},{}",
                step.step_index,
                step.time_s[k],
                step.current_a[k],
                step.voltage_v[k],
                step.state_of_charge[k]
            )?;
        }
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_experiment::Experiment;
    use cf_sim::{LumpedCell, Simulation};

    #[test]
    fn failed_run_still_exports_completed_steps() {
        let model = LumpedCell::new().unwrap();
        let experiment =
            Experiment::new(["Rest for 2 minutes", "Discharge at 1 kW for 1 hour"]).unwrap();
        let mut sim = Simulation::new(model, experiment).unwrap();
        let result = sim.solve().cloned();
        assert!(result.is_err());

        let dir = std::env::temp_dir().join(format!("cf-cli-partial-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let csv = dir.join("partial.csv");
        let json = dir.join("partial.json");

        let err = export_run(result, Some(&csv), Some(&json)).unwrap_err();
        assert!(matches!(err, CliError::Run(ref e) if e.step == 1));

        let text = std::fs::read_to_string(&csv).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("step,time_s,current_a,voltage_v,state_of_charge"));
        let rows: Vec<&str> = lines.collect();
        // Two minutes on the 60 s grid.
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.starts_with("0,")));

        let exported: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert!(exported.is_object());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
