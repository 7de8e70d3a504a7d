//! Fast-Lin: forward linear-bound propagation with the ReLU lower slope
//! fixed to match the upper-bound slope (a parallelogram relaxation).

use crate::constraint::BoxSet;
use crate::diagnostics::Diagnostics;
use crate::network::Network;

use super::linear_relax::{self, LowerSlope};
use super::{Propagator, PropagatorError};

/// Fast-Lin, fixing every crossing neuron's lower-bound slope to the slope
/// used for its upper bound (`u / (u - l)`), trading tightness for a
/// cheaper, non-adaptive relaxation relative to CROWN.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastLinPropagator;

impl Propagator for FastLinPropagator {
    fn bound(
        &self,
        input: &BoxSet,
        net: &Network,
        diagnostics: &mut Diagnostics,
    ) -> Result<BoxSet, PropagatorError> {
        Ok(linear_relax::propagate(
            input,
            net,
            LowerSlope::MatchUpper,
            diagnostics,
        )?)
    }

    fn name(&self) -> &'static str {
        "fast_lin"
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;
    use crate::network::{Activation, Layer};
    use crate::propagator::IbpPropagator;

    #[test]
    fn is_never_looser_than_ibp_on_a_crossing_relu() {
        let weight = DMatrix::from_row_slice(1, 1, &[1.0]);
        let bias = DVector::zeros(1);
        let layer = Layer::new(weight, bias, Activation::Relu).unwrap();
        let net = Network::from_layers(vec![layer]).unwrap();
        let input = BoxSet::from_bounds(&[-1.0], &[2.0]).unwrap();

        let mut diag = Diagnostics::new();
        let fast_lin = FastLinPropagator.bound(&input, &net, &mut diag).unwrap();
        let ibp = IbpPropagator.bound(&input, &net, &mut diag).unwrap();
        assert!(fast_lin.ub()[0] <= ibp.ub()[0] + 1e-9);
    }

    #[test]
    fn is_never_tighter_than_crown_on_a_crossing_relu() {
        use crate::propagator::CrownPropagator;

        let weight = DMatrix::from_row_slice(1, 1, &[1.0]);
        let bias = DVector::zeros(1);
        let layer = Layer::new(weight, bias, Activation::Relu).unwrap();
        let net = Network::from_layers(vec![layer]).unwrap();
        let input = BoxSet::from_bounds(&[-3.0], &[1.0]).unwrap();

        let mut diag = Diagnostics::new();
        let fast_lin = FastLinPropagator.bound(&input, &net, &mut diag).unwrap();
        let crown = CrownPropagator.bound(&input, &net, &mut diag).unwrap();
        assert!(crown.ub()[0] <= fast_lin.ub()[0] + 1e-9);
    }
}
