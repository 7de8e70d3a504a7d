//! Configuration: the §6 "recognized options" as a strongly-typed,
//! TOML-deserializable [`AnalysisOptions`], plus a `clap`-derived CLI
//! front-end ([`CliOptions`]) that can override any field — the same
//! two-layer split (a thin CLI wrapper flattening a library-facing options
//! struct) the teacher crate uses for its own synthesis options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constraint::BoundaryType;
use crate::error::ConfigError;

/// Which neural-network output-bound propagator to use (`analysis.propagator.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagatorType {
    /// Interval bound propagation.
    Ibp,
    /// CROWN linear relaxation with an adaptive lower slope.
    Crown,
    /// Fast-Lin linear relaxation with the lower slope pinned to the upper slope.
    FastLin,
    /// Semidefinite relaxation via an external convex solver.
    Sdp,
}

impl PropagatorType {
    /// The registry tag matching [`crate::propagator::from_tag`].
    pub fn tag(self) -> &'static str {
        match self {
            Self::Ibp => "ibp",
            Self::Crown => "crown",
            Self::FastLin => "fast_lin",
            Self::Sdp => "sdp",
        }
    }
}

/// Which partitioner strategy to use (`analysis.partitioner.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionerType {
    /// A single unsplit cell.
    None,
    /// A fixed uniform grid.
    Uniform,
    /// Simulation-guided refinement by largest bound-vs-sample gap.
    SimGuided,
    /// Simulation-guided refinement by largest new-area contribution.
    GreedySimGuided,
}

impl PartitionerType {
    /// The registry tag matching [`crate::partition::from_tag`].
    pub fn tag(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Uniform => "uniform",
            Self::SimGuided => "sim_guided",
            Self::GreedySimGuided => "greedy_sim_guided",
        }
    }
}

/// Forward vs. backward analysis (`analysis.reachability_direction`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityDirection {
    /// Compute the forward reachable tube from an initial set.
    Forward,
    /// Compute the backward back-projection from a target set.
    Backward,
}

/// The full set of options recognized by the analyzer (§6), independent of
/// how they were supplied (TOML file or CLI overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Which reference plant to analyze (`system.type`).
    pub system_type: String,
    /// Opaque controller identifier for the loader (`system.controller`,
    /// treated here as a filesystem path to a controller JSON record).
    pub system_controller: String,
    /// The propagator variant (`analysis.propagator.type`).
    pub propagator_type: PropagatorType,
    /// Which constraint representation partitioners aggregate into
    /// (`analysis.propagator.boundary_type`).
    pub boundary_type: BoundaryType,
    /// The partitioner variant (`analysis.partitioner.type`).
    pub partitioner_type: PartitionerType,
    /// Per-dimension part counts for `Uniform`, or a flat cell-count budget
    /// for the `SimGuided` variants (`analysis.partitioner.num_partitions`).
    pub num_partitions: Vec<usize>,
    /// Worst-gap tolerance terminating `SimGuided`/`GreedySimGuided`
    /// refinement early, below the cell-count budget.
    pub partitioner_tolerance: f64,
    /// The analysis horizon T (`analysis.t_max`).
    pub t_max: usize,
    /// Forward or backward analysis (`analysis.reachability_direction`).
    pub reachability_direction: ReachabilityDirection,
    /// Whether to compute the sample-based per-step error metric
    /// (`analysis.estimate_error`).
    pub estimate_error: bool,
    /// The RNG seed (`analysis.seed`).
    pub seed: u64,
    /// Wall-clock deadline for the whole analysis call, in milliseconds;
    /// `0` means no deadline.
    pub deadline_ms: u64,
    /// Whether per-cell propagation within one partitioner invocation may
    /// run in parallel (§5 NEW).
    pub parallel: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            system_type: "double_integrator".to_string(),
            system_controller: String::new(),
            propagator_type: PropagatorType::Ibp,
            boundary_type: BoundaryType::Box,
            partitioner_type: PartitionerType::None,
            num_partitions: Vec::new(),
            partitioner_tolerance: 0.0,
            t_max: 1,
            reachability_direction: ReachabilityDirection::Forward,
            estimate_error: false,
            seed: 0,
            deadline_ms: 0,
            parallel: false,
        }
    }
}

impl AnalysisOptions {
    /// Parses options from TOML text, starting from [`Self::default`] for
    /// any key the document omits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] if `text` fails to parse (the
    /// underlying `toml` error is folded into the key name it mentions).
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::MissingKey(e.to_string()))
    }

    /// Checks that `t_max >= 1`, mirroring the validation [`Dynamics`] and
    /// [`crate::network::Network`] already do for their own fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHorizon`] if `t_max == 0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.t_max == 0 {
            return Err(ConfigError::InvalidHorizon(0));
        }
        Ok(())
    }
}

/// The command-line front-end, mirroring the teacher crate's
/// `CliOptions`-wraps-`SynthesisOptions` split: a thin set of I/O-facing
/// flags plus every [`AnalysisOptions`] field, flattened so any of them can
/// be overridden without a config file.
#[derive(Debug, Clone, clap::Parser)]
#[command(version, about = "Closed-loop reachability analysis for neural-network controlled plants")]
pub struct CliOptions {
    /// A TOML configuration file to load before applying CLI overrides.
    #[arg(short = 'c', long = "config")]
    pub config_file: Option<PathBuf>,

    /// The initial (or target, in backward mode) box, as comma-separated
    /// `lb0,ub0,lb1,ub1,...` bounds.
    #[arg(long = "set", value_delimiter = ',')]
    pub initial_set: Vec<f64>,

    /// The trace level for the logging framework.
    #[arg(short = 't', long = "trace", value_enum, default_value_t = TraceLevel::Error)]
    pub trace_level: TraceLevel,

    #[command(flatten)]
    pub options: CliAnalysisOptions,
}

/// [`AnalysisOptions`]' fields, individually overridable from the command line.
#[derive(Debug, Clone, clap::Parser)]
pub struct CliAnalysisOptions {
    /// Which reference plant to analyze.
    #[arg(long = "system")]
    pub system_type: Option<String>,
    /// Path to the controller checkpoint (JSON record, §4.3).
    #[arg(long = "controller")]
    pub system_controller: Option<String>,
    /// The propagator variant.
    #[arg(long = "propagator", value_enum)]
    pub propagator_type: Option<PropagatorType>,
    /// The constraint representation partitioners aggregate into.
    #[arg(long = "boundary-type", value_enum)]
    pub boundary_type: Option<BoundaryType>,
    /// The partitioner variant.
    #[arg(long = "partitioner", value_enum)]
    pub partitioner_type: Option<PartitionerType>,
    /// Per-dimension part counts (Uniform) or cell budget (SimGuided variants).
    #[arg(long = "num-partitions", value_delimiter = ',')]
    pub num_partitions: Option<Vec<usize>>,
    /// Worst-gap tolerance for SimGuided/GreedySimGuided early termination.
    #[arg(long = "tolerance")]
    pub partitioner_tolerance: Option<f64>,
    /// The analysis horizon T.
    #[arg(long = "t-max")]
    pub t_max: Option<usize>,
    /// Forward or backward analysis.
    #[arg(long = "direction", value_enum)]
    pub reachability_direction: Option<ReachabilityDirection>,
    /// Whether to compute the sample-based per-step error metric.
    #[arg(long = "estimate-error")]
    pub estimate_error: bool,
    /// The RNG seed.
    #[arg(long = "seed")]
    pub seed: Option<u64>,
    /// Wall-clock deadline in milliseconds; omit for no deadline.
    #[arg(long = "deadline-ms")]
    pub deadline_ms: Option<u64>,
    /// Propagate a partitioner's cells in parallel.
    #[arg(long = "parallel")]
    pub parallel: bool,
}

impl CliAnalysisOptions {
    /// Applies every `Some`-valued override onto `base`, leaving fields the
    /// CLI did not set untouched.
    pub fn apply(&self, base: &mut AnalysisOptions) {
        if let Some(v) = &self.system_type {
            base.system_type = v.clone();
        }
        if let Some(v) = &self.system_controller {
            base.system_controller = v.clone();
        }
        if let Some(v) = self.propagator_type {
            base.propagator_type = v;
        }
        if let Some(v) = self.boundary_type {
            base.boundary_type = v;
        }
        if let Some(v) = self.partitioner_type {
            base.partitioner_type = v;
        }
        if let Some(v) = &self.num_partitions {
            base.num_partitions = v.clone();
        }
        if let Some(v) = self.partitioner_tolerance {
            base.partitioner_tolerance = v;
        }
        if let Some(v) = self.t_max {
            base.t_max = v;
        }
        if let Some(v) = self.reachability_direction {
            base.reachability_direction = v;
        }
        if self.estimate_error {
            base.estimate_error = true;
        }
        if let Some(v) = self.seed {
            base.seed = v;
        }
        if let Some(v) = self.deadline_ms {
            base.deadline_ms = v;
        }
        if self.parallel {
            base.parallel = true;
        }
    }
}

/// The trace level / verbosity for the logging framework, matching the
/// teacher crate's own `TraceLevel` one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TraceLevel {
    /// Turn logging off.
    Off,
    /// Only print errors.
    Error,
    /// Print errors and warnings.
    Warn,
    /// Print errors, warnings and useful information.
    Info,
    /// Print errors, warnings, useful and debug information.
    Debug,
    /// Print all information, including very verbose output.
    Trace,
}

impl From<TraceLevel> for log::LevelFilter {
    fn from(level: TraceLevel) -> Self {
        match level {
            TraceLevel::Off => Self::Off,
            TraceLevel::Error => Self::Error,
            TraceLevel::Warn => Self::Warn,
            TraceLevel::Info => Self::Info,
            TraceLevel::Debug => Self::Debug,
            TraceLevel::Trace => Self::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_toml() {
        let options = AnalysisOptions::from_toml("").unwrap();
        assert_eq!(options.t_max, 1);
        assert!(matches!(options.propagator_type, PropagatorType::Ibp));
    }

    #[test]
    fn toml_overrides_only_named_fields() {
        let text = "t_max = 5\npropagator_type = \"crown\"\n";
        let options = AnalysisOptions::from_toml(text).unwrap();
        assert_eq!(options.t_max, 5);
        assert!(matches!(options.propagator_type, PropagatorType::Crown));
        assert_eq!(options.seed, 0);
    }

    #[test]
    fn rejects_zero_horizon() {
        let mut options = AnalysisOptions::default();
        options.t_max = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn cli_override_replaces_only_set_fields() {
        let mut options = AnalysisOptions::default();
        let overrides = CliAnalysisOptions {
            system_type: None,
            system_controller: None,
            propagator_type: Some(PropagatorType::Sdp),
            boundary_type: None,
            partitioner_type: None,
            num_partitions: None,
            partitioner_tolerance: None,
            t_max: Some(10),
            reachability_direction: None,
            estimate_error: false,
            seed: None,
            deadline_ms: None,
            parallel: false,
        };
        overrides.apply(&mut options);
        assert_eq!(options.t_max, 10);
        assert!(matches!(options.propagator_type, PropagatorType::Sdp));
        assert_eq!(options.system_type, "double_integrator");
    }
}
