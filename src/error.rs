//! Domain error types for the reachability engine.
//!
//! Follows the propagation policy of the specification: dimension and
//! configuration errors are fatal and surfaced to the caller; numerical
//! degeneracies are recovered locally (see [`crate::diagnostics`]) and never
//! appear here; solver failures are fatal but do not erase an
//! already-computed prefix of a tube (see [`AnalysisError`], re-exported at
//! [`crate::analyzer::AnalysisError`]).

use thiserror::Error;

/// A mismatch between the ambient dimension of a constraint and an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DimensionError {
    /// Two operands of an operation had different ambient dimensions.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    Mismatch {
        /// The dimension required by the operation.
        expected: usize,
        /// The dimension actually supplied.
        actual: usize,
    },
    /// A box was constructed with a lower bound exceeding its upper bound.
    #[error("invalid box at dimension {axis}: lower bound {lb} exceeds upper bound {ub}")]
    InvalidBox {
        /// The offending axis.
        axis: usize,
        /// The lower bound supplied.
        lb: f64,
        /// The upper bound supplied.
        ub: f64,
    },
    /// A matrix/vector pair had incompatible shapes for matrix-vector multiplication.
    #[error("incompatible shapes: matrix is {rows}x{cols}, vector has length {vec_len}")]
    ShapeMismatch {
        /// Row count of the matrix operand.
        rows: usize,
        /// Column count of the matrix operand.
        cols: usize,
        /// Length of the vector operand.
        vec_len: usize,
    },
}

/// An error in the static configuration of an analysis run.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required configuration key was missing.
    #[error("missing configuration key: {0}")]
    MissingKey(String),
    /// A configuration value did not match one of the recognized enum variants.
    #[error("unknown value {value:?} for option {option}")]
    UnknownVariant {
        /// The option name, e.g. `analysis.propagator.type`.
        option: String,
        /// The value that failed to parse.
        value: String,
    },
    /// The controller's input/output dimension did not match the plant's.
    #[error(
        "controller output dimension {controller_outputs} does not match plant input dimension {plant_inputs}"
    )]
    ControllerPlantMismatch {
        /// Number of outputs produced by the controller network.
        controller_outputs: usize,
        /// Number of actuator inputs expected by the plant.
        plant_inputs: usize,
    },
    /// The horizon `t_max` was not a positive integer.
    #[error("t_max must be >= 1, got {0}")]
    InvalidHorizon(i64),
    /// A dynamics matrix was not square or otherwise dimensionally inconsistent.
    #[error("dynamics matrix A must be square, got {rows}x{cols}")]
    NonSquareDynamics {
        /// Row count supplied for `A`.
        rows: usize,
        /// Column count supplied for `A`.
        cols: usize,
    },
    /// Backward analysis was requested but the dynamics matrix `A` is not invertible.
    #[error("backward analysis requires an invertible A matrix")]
    NonInvertibleDynamics,
}

/// A fatal failure reported by an external convex solver (used by the SDP propagator).
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    /// The solver determined the relaxation was infeasible.
    #[error("solver reported infeasible problem")]
    Infeasible,
    /// The solver failed for an implementation-specific reason.
    #[error("solver error: {0}")]
    Failed(String),
}

/// The top-level failure of an [`crate::analyzer::Analyzer`] call, layering
/// every lower error kind behind one type the binary's exit-code mapping
/// switches on (§7 NEW).
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// The static configuration was invalid (bad enum tag, mismatched
    /// controller/plant dimensions, non-positive horizon).
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A constraint operation hit a dimension mismatch that configuration
    /// validation should have ruled out but didn't (e.g. a hand-built
    /// initial set of the wrong dimension).
    #[error(transparent)]
    Dimension(#[from] DimensionError),
    /// The SDP propagator's external solver failed for some cell.
    #[error(transparent)]
    Solver(#[from] SolverError),
}

impl AnalysisError {
    /// The process exit code this error maps to (§6: 2 configuration
    /// error, 3 solver error; dimension errors are a configuration defect
    /// too and share code 2).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Dimension(_) => 2,
            Self::Solver(_) => 3,
        }
    }
}
