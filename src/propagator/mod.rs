//! Output-bound propagators: sound over-approximations of a network's
//! output range over an input box.

mod crown;
mod fast_lin;
mod ibp;
mod linear_relax;
pub mod sdp;

use thiserror::Error;

pub use crown::CrownPropagator;
pub use fast_lin::FastLinPropagator;
pub use ibp::IbpPropagator;
pub use sdp::SdpPropagator;

use crate::constraint::BoxSet;
use crate::diagnostics::Diagnostics;
use crate::error::DimensionError;
use crate::network::Network;

/// A propagator-specific failure, layered under [`crate::analyzer::AnalysisError`].
#[derive(Debug, Clone, Error)]
pub enum PropagatorError {
    /// The input box's dimension did not match the network's input dimension.
    #[error(transparent)]
    Dimension(#[from] DimensionError),
    /// The underlying convex solver (SDP propagator only) failed.
    #[error(transparent)]
    Solver(#[from] crate::error::SolverError),
}

/// A capability for bounding a feed-forward network's output range over a box.
pub trait Propagator {
    /// Computes a sound over-approximation of `net`'s output range for every
    /// input in `input`, recording any numerical degeneracies encountered
    /// into `diagnostics`.
    fn bound(
        &self,
        input: &BoxSet,
        net: &Network,
        diagnostics: &mut Diagnostics,
    ) -> Result<BoxSet, PropagatorError>;

    /// A short tag identifying this propagator, matching the `analysis.propagator.type`
    /// configuration values named in the external interface.
    fn name(&self) -> &'static str;
}

/// Instantiates a [`Propagator`] from its configuration string tag.
///
/// # Errors
///
/// Returns [`crate::error::ConfigError::UnknownVariant`] if `tag` is not one
/// of `"ibp"`, `"crown"`, `"fast_lin"`, `"sdp"`.
pub fn from_tag(tag: &str) -> Result<Box<dyn Propagator>, crate::error::ConfigError> {
    match tag {
        "ibp" => Ok(Box::new(IbpPropagator)),
        "crown" => Ok(Box::new(CrownPropagator)),
        "fast_lin" => Ok(Box::new(FastLinPropagator)),
        "sdp" => Ok(Box::new(SdpPropagator::new(sdp::NaiveConicSolver))),
        other => Err(crate::error::ConfigError::UnknownVariant {
            option: "analysis.propagator.type".to_string(),
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(from_tag("nonexistent").is_err());
    }

    #[test]
    fn known_tags_resolve() {
        for tag in ["ibp", "crown", "fast_lin", "sdp"] {
            assert!(from_tag(tag).is_ok());
        }
    }
}
