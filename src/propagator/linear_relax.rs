//! Shared forward linear-bound propagation engine backing both the CROWN
//! and Fast-Lin propagators.
//!
//! Each layer's output is bounded by a pair of affine functions of the
//! *original* network input, `A_lo x + b_lo <= y <= A_up x + b_up`. Pushing
//! an affine layer through these bounds is the same signed-matrix rule IBP
//! uses on concrete values, applied instead to the coefficient matrices.
//! Pushing a ReLU layer through requires, per crossing neuron, choosing a
//! lower-bound slope `lambda in [0, 1]`; the two propagators differ only in
//! that choice (see [`LowerSlope`]).

use nalgebra::{DMatrix, DVector};

use crate::constraint::BoxSet;
use crate::diagnostics::{Diagnostics, NumericalWarning};
use crate::error::DimensionError;
use crate::network::{Activation, Network};

/// The degeneracy threshold below which a crossing neuron's relaxation is
/// replaced by its concrete interval bound rather than risk dividing by a
/// near-zero width.
const EPS: f64 = 1e-12;

/// How a crossing neuron's lower-bound slope is chosen.
#[derive(Debug, Clone, Copy)]
pub enum LowerSlope {
    /// CROWN's adaptive choice: `1` if `u >= -l` (tighter), else `0`.
    Adaptive,
    /// Fast-Lin's choice: the same slope used for the upper bound,
    /// `u / (u - l)`, giving a parallelogram relaxation.
    MatchUpper,
}

struct AffineBounds {
    a_lo: DMatrix<f64>,
    b_lo: DVector<f64>,
    a_up: DMatrix<f64>,
    b_up: DVector<f64>,
}

impl AffineBounds {
    fn identity(dim: usize) -> Self {
        Self {
            a_lo: DMatrix::identity(dim, dim),
            b_lo: DVector::zeros(dim),
            a_up: DMatrix::identity(dim, dim),
            b_up: DVector::zeros(dim),
        }
    }

    /// Pushes this bound through an affine layer `z = W y + b`.
    fn through_affine(&self, weight: &DMatrix<f64>, bias: &DVector<f64>) -> Self {
        let w_pos = weight.map(|v| v.max(0.0));
        let w_neg = weight.map(|v| v.min(0.0));
        Self {
            a_lo: &w_pos * &self.a_lo + &w_neg * &self.a_up,
            b_lo: &w_pos * &self.b_lo + &w_neg * &self.b_up + bias,
            a_up: &w_pos * &self.a_up + &w_neg * &self.a_lo,
            b_up: &w_pos * &self.b_up + &w_neg * &self.b_lo + bias,
        }
    }

    /// The concrete interval this bound implies over the original input box.
    fn concretize(&self, input: &BoxSet) -> BoxSet {
        let lb = {
            let w_pos = self.a_lo.map(|v| v.max(0.0));
            let w_neg = self.a_lo.map(|v| v.min(0.0));
            &w_pos * input.lb() + &w_neg * input.ub() + &self.b_lo
        };
        let ub = {
            let w_pos = self.a_up.map(|v| v.max(0.0));
            let w_neg = self.a_up.map(|v| v.min(0.0));
            &w_pos * input.ub() + &w_neg * input.lb() + &self.b_up
        };
        BoxSet::new(lb, ub).unwrap_or_else(|_| {
            // Numerical noise can invert lb/ub by an epsilon; clamp to a
            // degenerate point rather than propagate an invalid box.
            let mid = (input.lb() + input.ub()) * 0.5;
            BoxSet::point(mid)
        })
    }

    /// Relaxes a ReLU applied elementwise to this bound, given the concrete
    /// pre-activation interval per neuron.
    fn relu(&self, concrete: &BoxSet, slope: LowerSlope, layer_idx: usize, diagnostics: &mut Diagnostics) -> Self {
        let dim = self.a_lo.nrows();
        let mut a_lo = DMatrix::zeros(dim, self.a_lo.ncols());
        let mut b_lo = DVector::zeros(dim);
        let mut a_up = DMatrix::zeros(dim, self.a_up.ncols());
        let mut b_up = DVector::zeros(dim);
        for i in 0..dim {
            let l = concrete.lb()[i];
            let u = concrete.ub()[i];
            if u <= 0.0 {
                // identically zero; rows stay zero
                continue;
            }
            if l >= 0.0 {
                for c in 0..a_lo.ncols() {
                    a_lo[(i, c)] = self.a_lo[(i, c)];
                    a_up[(i, c)] = self.a_up[(i, c)];
                }
                b_lo[i] = self.b_lo[i];
                b_up[i] = self.b_up[i];
                continue;
            }
            let width = u - l;
            if width <= EPS {
                diagnostics.warn(NumericalWarning::DegenerateSlope {
                    layer: layer_idx,
                    neuron: i,
                    width,
                });
                b_up[i] = u.max(0.0);
                continue;
            }
            let alpha_up = u / width;
            let intercept_up = -l * alpha_up;
            for c in 0..a_up.ncols() {
                a_up[(i, c)] = self.a_up[(i, c)] * alpha_up;
            }
            b_up[i] = self.b_up[i] * alpha_up + intercept_up;

            let lambda = match slope {
                LowerSlope::MatchUpper => alpha_up,
                LowerSlope::Adaptive => {
                    if u >= -l {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
            if lambda != 0.0 {
                for c in 0..a_lo.ncols() {
                    a_lo[(i, c)] = self.a_lo[(i, c)] * lambda;
                }
                b_lo[i] = self.b_lo[i] * lambda;
            }
        }
        Self {
            a_lo,
            b_lo,
            a_up,
            b_up,
        }
    }
}

/// Runs forward linear-bound propagation over `net`, using `slope` to choose
/// each crossing ReLU neuron's lower-bound tightness.
///
/// # Errors
///
/// Returns [`DimensionError`] if `input`'s dimension does not match the
/// network's input dimension.
pub fn propagate(
    input: &BoxSet,
    net: &Network,
    slope: LowerSlope,
    diagnostics: &mut Diagnostics,
) -> Result<BoxSet, DimensionError> {
    if input.dim() != net.input_dim() {
        return Err(DimensionError::Mismatch {
            expected: net.input_dim(),
            actual: input.dim(),
        });
    }
    let mut bounds = AffineBounds::identity(input.dim());
    for (idx, layer) in net.layers().iter().enumerate() {
        bounds = bounds.through_affine(layer.weight(), layer.bias());
        if layer.activation() == Activation::Relu {
            let concrete = bounds.concretize(input);
            bounds = bounds.relu(&concrete, slope, idx, diagnostics);
        }
    }
    Ok(bounds.concretize(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Layer;

    #[test]
    fn matches_ibp_on_a_single_affine_layer() {
        let weight = DMatrix::from_row_slice(1, 1, &[2.0]);
        let bias = DVector::from_row_slice(&[1.0]);
        let layer = Layer::new(weight, bias, Activation::Linear).unwrap();
        let net = Network::from_layers(vec![layer]).unwrap();
        let input = BoxSet::from_bounds(&[0.0], &[1.0]).unwrap();
        let mut diag = Diagnostics::new();
        let out = propagate(&input, &net, LowerSlope::Adaptive, &mut diag).unwrap();
        assert_eq!(out.lb()[0], 1.0);
        assert_eq!(out.ub()[0], 3.0);
    }
}
