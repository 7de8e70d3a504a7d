//! On-disk controller format: a JSON record of ordered layers.
//!
//! This is the "loader for a specific on-disk format" the network model
//! itself stays agnostic of — controller checkpoints are produced by
//! whatever training pipeline trains them; this crate only needs to read
//! the resulting weights back in.

use nalgebra::{DMatrix, DVector};
use serde::Deserialize;

use super::{Activation, Layer, Network};
use crate::error::DimensionError;

/// One layer as it appears in a controller JSON file: row-major weights.
#[derive(Debug, Deserialize)]
pub struct LayerSpec {
    /// Row-major flattened weight matrix.
    pub weights: Vec<Vec<f64>>,
    /// Bias vector.
    pub bias: Vec<f64>,
    /// Activation applied after this layer's affine map.
    pub activation: Activation,
}

/// The full on-disk controller record: input/output dims plus ordered layers.
#[derive(Debug, Deserialize)]
pub struct NetworkSpec {
    /// Declared input dimension, checked against the first layer's shape.
    pub input_dim: usize,
    /// Declared output dimension, checked against the last layer's shape.
    pub output_dim: usize,
    /// The ordered layers.
    pub layers: Vec<LayerSpec>,
}

impl NetworkSpec {
    /// Parses a controller record from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Converts the on-disk record into an evaluable [`Network`], checking
    /// the declared dimensions against the actual layer shapes.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError`] if any layer's shape is inconsistent with
    /// its neighbors or with the declared `input_dim`/`output_dim`.
    pub fn into_network(self) -> Result<Network, DimensionError> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for spec in self.layers {
            let rows = spec.weights.len();
            let cols = spec.weights.first().map_or(0, Vec::len);
            let flat: Vec<f64> = spec.weights.into_iter().flatten().collect();
            if flat.len() != rows * cols {
                return Err(DimensionError::ShapeMismatch {
                    rows,
                    cols,
                    vec_len: flat.len(),
                });
            }
            let weight = DMatrix::from_row_slice(rows, cols, &flat);
            let bias = DVector::from_row_slice(&spec.bias);
            layers.push(Layer::new(weight, bias, spec.activation)?);
        }
        let net = Network::from_layers(layers)?;
        if net.input_dim() != self.input_dim {
            return Err(DimensionError::Mismatch {
                expected: self.input_dim,
                actual: net.input_dim(),
            });
        }
        if net.output_dim() != self.output_dim {
            return Err(DimensionError::Mismatch {
                expected: self.output_dim,
                actual: net.output_dim(),
            });
        }
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_two_layer_controller() {
        let text = r#"{
            "input_dim": 2,
            "output_dim": 1,
            "layers": [
                { "weights": [[1.0, 0.0], [0.0, 1.0]], "bias": [0.0, 0.0], "activation": "relu" },
                { "weights": [[1.0, 1.0]], "bias": [0.0], "activation": "linear" }
            ]
        }"#;
        let spec = NetworkSpec::from_json(text).unwrap();
        let net = spec.into_network().unwrap();
        assert_eq!(net.input_dim(), 2);
        assert_eq!(net.output_dim(), 1);
    }

    #[test]
    fn rejects_declared_dim_mismatch() {
        let text = r#"{
            "input_dim": 3,
            "output_dim": 1,
            "layers": [
                { "weights": [[1.0, 1.0]], "bias": [0.0], "activation": "linear" }
            ]
        }"#;
        let spec = NetworkSpec::from_json(text).unwrap();
        assert!(spec.into_network().is_err());
    }
}
