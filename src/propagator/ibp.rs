//! Interval bound propagation: the cheapest, loosest propagator.

use crate::constraint::BoxSet;
use crate::diagnostics::Diagnostics;
use crate::network::{Activation, Network};

use super::{Propagator, PropagatorError};

/// Propagates an input box layer-by-layer using signed-matrix interval
/// arithmetic, clamping at zero after each ReLU layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IbpPropagator;

impl Propagator for IbpPropagator {
    fn bound(
        &self,
        input: &BoxSet,
        net: &Network,
        _diagnostics: &mut Diagnostics,
    ) -> Result<BoxSet, PropagatorError> {
        let mut cur = input.clone();
        for layer in net.layers() {
            cur = cur.affine_image(layer.weight(), layer.bias())?;
            if layer.activation() == Activation::Relu {
                let zero = nalgebra::DVector::zeros(cur.dim());
                let upper = nalgebra::DVector::from_element(cur.dim(), f64::MAX);
                cur = cur.clip(&zero, &upper)?;
            }
        }
        Ok(cur)
    }

    fn name(&self) -> &'static str {
        "ibp"
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;
    use crate::network::Layer;

    #[test]
    fn relu_layer_clamps_negative_lower_bound() {
        let weight = DMatrix::identity(1, 1);
        let bias = DVector::zeros(1);
        let layer = Layer::new(weight, bias, Activation::Relu).unwrap();
        let net = Network::from_layers(vec![layer]).unwrap();
        let input = BoxSet::from_bounds(&[-2.0], &[1.0]).unwrap();
        let mut diag = Diagnostics::new();
        let out = IbpPropagator.bound(&input, &net, &mut diag).unwrap();
        assert_eq!(out.lb()[0], 0.0);
        assert_eq!(out.ub()[0], 1.0);
    }
}
