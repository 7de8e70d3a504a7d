//! Feed-forward ReLU network model: the controller being analyzed.

pub mod io;

use nalgebra::{DMatrix, DVector};

use crate::error::DimensionError;

/// The activation applied after a layer's affine map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// `max(x, 0)` elementwise.
    Relu,
    /// No nonlinearity; used for the final layer.
    Linear,
}

impl Activation {
    fn apply(self, x: DVector<f64>) -> DVector<f64> {
        match self {
            Self::Relu => x.map(|v| v.max(0.0)),
            Self::Linear => x,
        }
    }
}

/// One affine-plus-activation layer: `y = activation(W x + b)`.
#[derive(Debug, Clone)]
pub struct Layer {
    weight: DMatrix<f64>,
    bias: DVector<f64>,
    activation: Activation,
}

impl Layer {
    /// Builds a layer from its weight matrix, bias vector and activation.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::ShapeMismatch`] if `bias.len() !=
    /// weight.nrows()`.
    pub fn new(weight: DMatrix<f64>, bias: DVector<f64>, activation: Activation) -> Result<Self, DimensionError> {
        if bias.len() != weight.nrows() {
            return Err(DimensionError::ShapeMismatch {
                rows: weight.nrows(),
                cols: weight.ncols(),
                vec_len: bias.len(),
            });
        }
        Ok(Self {
            weight,
            bias,
            activation,
        })
    }

    /// The number of inputs this layer accepts.
    pub fn input_dim(&self) -> usize {
        self.weight.ncols()
    }

    /// The number of outputs this layer produces.
    pub fn output_dim(&self) -> usize {
        self.weight.nrows()
    }

    /// The weight matrix.
    pub fn weight(&self) -> &DMatrix<f64> {
        &self.weight
    }

    /// The bias vector.
    pub fn bias(&self) -> &DVector<f64> {
        &self.bias
    }

    /// The activation function applied after the affine map.
    pub fn activation(&self) -> Activation {
        self.activation
    }

    fn eval(&self, x: &DVector<f64>) -> DVector<f64> {
        self.activation.apply(&self.weight * x + &self.bias)
    }
}

/// A feed-forward network: an ordered stack of [`Layer`]s.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
}

impl Network {
    /// Builds a network from an ordered list of layers, each layer's input
    /// dimension matching the previous layer's output dimension.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::Mismatch`] if consecutive layers disagree
    /// on dimension, or if `layers` is empty.
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self, DimensionError> {
        if layers.is_empty() {
            return Err(DimensionError::Mismatch {
                expected: 1,
                actual: 0,
            });
        }
        for pair in layers.windows(2) {
            if pair[0].output_dim() != pair[1].input_dim() {
                return Err(DimensionError::Mismatch {
                    expected: pair[0].output_dim(),
                    actual: pair[1].input_dim(),
                });
            }
        }
        Ok(Self { layers })
    }

    /// The network's input dimension.
    pub fn input_dim(&self) -> usize {
        self.layers[0].input_dim()
    }

    /// The network's output dimension.
    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].output_dim()
    }

    /// The ordered layers.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The number of layers.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Evaluates the network exactly on a concrete point.
    pub fn eval(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut cur = x.clone();
        for layer in &self.layers {
            cur = layer.eval(&cur);
        }
        cur
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_relu_net(dim: usize) -> Network {
        let weight = DMatrix::identity(dim, dim);
        let bias = DVector::zeros(dim);
        let layer = Layer::new(weight, bias, Activation::Relu).unwrap();
        Network::from_layers(vec![layer]).unwrap()
    }

    #[test]
    fn relu_clips_negative_inputs() {
        let net = identity_relu_net(2);
        let out = net.eval(&DVector::from_row_slice(&[-1.0, 2.0]));
        assert_eq!(out, DVector::from_row_slice(&[0.0, 2.0]));
    }

    #[test]
    fn rejects_mismatched_layer_chain() {
        let l1 = Layer::new(DMatrix::identity(2, 2), DVector::zeros(2), Activation::Relu).unwrap();
        let l2 = Layer::new(DMatrix::identity(3, 3), DVector::zeros(3), Activation::Linear).unwrap();
        assert!(Network::from_layers(vec![l1, l2]).is_err());
    }

    #[test]
    fn rejects_empty_network() {
        assert!(Network::from_layers(vec![]).is_err());
    }
}
