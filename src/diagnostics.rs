//! Non-fatal diagnostics accumulated during an analysis run.
//!
//! Per the specification, numerical degeneracies (e.g. a CROWN/Fast-Lin
//! neuron whose relaxation denominator is unstable) are recovered locally and
//! reported, never treated as fatal errors. Call sites still log through
//! [`log`] at `warn!`/`debug!` density matching the teacher crate; this type
//! additionally gives embedding callers the same information as data.

use std::fmt;

/// A single non-fatal numerical degeneracy encountered while propagating bounds.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericalWarning {
    /// A CROWN/Fast-Lin neuron had `U - L <= epsilon` and was treated as
    /// stable/inactive, falling back to the interval bound for that neuron.
    DegenerateSlope {
        /// Index of the layer containing the neuron.
        layer: usize,
        /// Index of the neuron within the layer.
        neuron: usize,
        /// The pre-activation width `U - L` that triggered the fallback.
        width: f64,
    },
    /// A sampled or propagated set was empty when a non-empty set was expected
    /// (e.g. a partition cell whose bounding box has zero volume).
    EmptyIntersection {
        /// Human-readable context for where the empty set arose.
        context: String,
    },
}

impl fmt::Display for NumericalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateSlope {
                layer,
                neuron,
                width,
            } => write!(
                f,
                "degenerate slope at layer {layer} neuron {neuron} (width {width:.3e}), falling back to interval bound"
            ),
            Self::EmptyIntersection { context } => {
                write!(f, "empty intersection encountered: {context}")
            }
        }
    }
}

/// An append-only accumulator of [`NumericalWarning`]s produced during one
/// [`crate::analyzer::Analyzer`] call.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<NumericalWarning>,
}

impl Diagnostics {
    /// Creates an empty diagnostics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning, also emitting it through the `log` facade at `debug!` level.
    pub fn warn(&mut self, warning: NumericalWarning) {
        log::debug!("{}", warning);
        self.warnings.push(warning);
    }

    /// Returns all warnings recorded so far, in the order they occurred.
    pub fn warnings(&self) -> &[NumericalWarning] {
        &self.warnings
    }

    /// Returns `true` if no warnings have been recorded.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Appends every warning from `other`, in order. Used to fold back
    /// per-cell diagnostics collected by cells propagated in parallel
    /// (§5's parallel mode), where each cell accumulates into its own
    /// sink before the results are joined on the calling thread.
    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }
}
