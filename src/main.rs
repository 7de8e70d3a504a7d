//! Reachtube binary: wires [`config::AnalysisOptions`] into an
//! [`analyzer::Analyzer`] run and reports the result on stdout.

use std::io::{self, Write};
use std::time::Duration;

use clap::Parser;
use fs_err as fs;
use thiserror::Error;

use reachtube::analyzer::Analyzer;
use reachtube::config::CliOptions;
use reachtube::constraint::BoxSet;
use reachtube::deadline::Deadline;
use reachtube::error::AnalysisError;
use reachtube::network::io::NetworkSpec;
use reachtube::{config, plant};

/// Any failure that can stop the binary before an [`AnalysisError`] even
/// has a chance to occur (I/O, malformed TOML/JSON, or a malformed initial
/// set on the command line).
#[derive(Debug, Error)]
enum AppError {
    /// Reading the config file or controller checkpoint failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The controller checkpoint was not valid JSON for [`NetworkSpec`].
    #[error("invalid controller file: {0}")]
    ControllerFormat(#[from] serde_json::Error),
    /// `--set` did not parse into an even number of `lb,ub` pairs.
    #[error("--set must list an even number of lb,ub values, got {0}")]
    OddSetLength(usize),
    /// The run-time analysis failed before producing any tube.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    /// The underlying [`reachtube::error::ConfigError`] or
    /// [`reachtube::error::DimensionError`] from setup, folded through
    /// [`AnalysisError`]'s own `From` impls for a single exit path.
    #[error(transparent)]
    Config(#[from] reachtube::error::ConfigError),
    #[error(transparent)]
    Dimension(#[from] reachtube::error::DimensionError),
}

impl AppError {
    /// The process exit code (§6): I/O and parsing failures share the
    /// configuration-error code, since they are all setup defects.
    fn exit_code(&self) -> i32 {
        match self {
            Self::Analysis(e) => e.exit_code(),
            Self::Io(_) | Self::ControllerFormat(_) | Self::OddSetLength(_) | Self::Config(_) | Self::Dimension(_) => 2,
        }
    }
}

fn main() {
    match run() {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(error) => {
            let _ = writeln!(io::stderr(), "Error: {error}");
            std::process::exit(error.exit_code());
        }
    }
}

/// Initializes the logging framework at the requested trace level.
fn initialize_logging(level: config::TraceLevel) {
    env_logger::builder()
        .filter(None, level.into())
        .format_timestamp_millis()
        .init();
}

fn parse_initial_set(values: &[f64]) -> Result<BoxSet, AppError> {
    if values.len() % 2 != 0 {
        return Err(AppError::OddSetLength(values.len()));
    }
    let dim = values.len() / 2;
    let lb: Vec<f64> = (0..dim).map(|i| values[2 * i]).collect();
    let ub: Vec<f64> = (0..dim).map(|i| values[2 * i + 1]).collect();
    Ok(BoxSet::from_bounds(&lb, &ub)?)
}

fn run() -> Result<i32, AppError> {
    let cli = CliOptions::parse();
    initialize_logging(cli.trace_level);

    let mut options = if let Some(path) = &cli.config_file {
        let text = fs::read_to_string(path)?;
        config::AnalysisOptions::from_toml(&text)?
    } else {
        config::AnalysisOptions::default()
    };
    cli.options.apply(&mut options);

    let controller_text = fs::read_to_string(&options.system_controller)?;
    let controller = NetworkSpec::from_json(&controller_text)?.into_network()?;
    let plant = plant::from_tag(&options.system_type, options.reachability_direction)?;
    let boundary_set = parse_initial_set(&cli.initial_set)?;
    let deadline = if options.deadline_ms > 0 {
        Some(Deadline::after(Duration::from_millis(options.deadline_ms)))
    } else {
        None
    };

    let analyzer = Analyzer::new(options)?;
    let result = analyzer.analyze(&boundary_set, &controller, plant.dynamics(), deadline)?;

    report(&result);

    if let Some(error) = &result.error {
        return Ok(error.exit_code());
    }
    let steps_completed = result.tube.len().saturating_sub(1);
    if result.truncated && steps_completed == 0 {
        return Ok(4);
    }
    Ok(0)
}

fn report(result: &reachtube::analyzer::AnalysisResult) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = writeln!(out, "timesteps completed: {}", result.tube.len().saturating_sub(1));
    let _ = writeln!(out, "truncated: {}", result.truncated);
    let _ = writeln!(out, "runtime_ms: {}", result.runtime_ms);
    let _ = writeln!(out, "cells_per_step: {:?}", result.cells_per_step);
    if !result.per_step_error.is_empty() {
        let _ = writeln!(out, "per_step_error: {:?}", result.per_step_error);
        let _ = writeln!(out, "avg_error: {:.6}", result.avg_error);
    }
    for (t, constraint) in result.tube.iter().enumerate() {
        let bounds = constraint.bounding_box();
        let _ = writeln!(out, "S_{t}: lb={:?} ub={:?}", bounds.lb().as_slice(), bounds.ub().as_slice());
    }
    if !result.diagnostics.is_empty() {
        let _ = writeln!(out, "diagnostics:");
        for warning in result.diagnostics.warnings() {
            let _ = writeln!(out, "  {warning}");
        }
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "error: {error}");
    }
}
