//! CROWN: forward linear-bound propagation with an adaptive ReLU lower slope.

use crate::constraint::BoxSet;
use crate::diagnostics::Diagnostics;
use crate::network::Network;

use super::linear_relax::{self, LowerSlope};
use super::{Propagator, PropagatorError};

/// CROWN, choosing each crossing neuron's lower-bound slope in `{0, 1}` to
/// minimize the relaxation's area.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrownPropagator;

impl Propagator for CrownPropagator {
    fn bound(
        &self,
        input: &BoxSet,
        net: &Network,
        diagnostics: &mut Diagnostics,
    ) -> Result<BoxSet, PropagatorError> {
        Ok(linear_relax::propagate(input, net, LowerSlope::Adaptive, diagnostics)?)
    }

    fn name(&self) -> &'static str {
        "crown"
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
        let crown = CrownPropagator.bound(&input, &net, &mut diag).unwrap();
        let ibp = IbpPropagator.bound(&input, &net, &mut diag).unwrap();
        assert!(crown.ub()[0] <= ibp.ub()[0] + 1e-9);
    }
}
