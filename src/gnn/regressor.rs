//! Final affine projection from node embeddings to age estimates.

use crate::core::{Error, Result};
use crate::gnn::init::fan_in_uniform;
use ndarray::{Array1, Array2};
use rand::Rng;

/// `y = x W + b`, applied per node row. No activation.
#[derive(Clone, Debug)]
pub struct AgeRegressor {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl AgeRegressor {
    /// Create a regressor with uniform fan-in initialization.
    pub fn new<R: Rng>(rng: &mut R, in_channels: usize, out_channels: usize) -> Self {
        let weight = fan_in_uniform(rng, in_channels, (in_channels, out_channels));
        let bias = fan_in_uniform(rng, in_channels, (1, out_channels)).row(0).to_owned();
        Self { weight, bias }
    }

    /// Create a regressor from explicit parameters.
    pub fn from_parameters(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if bias.len() != weight.ncols() {
            return Err(Error::shape("regressor bias", weight.ncols(), bias.len()));
        }
        Ok(Self { weight, bias })
    }

    /// Embedding width.
    pub fn in_channels(&self) -> usize {
        self.weight.nrows()
    }

    /// Prediction width.
    pub fn out_channels(&self) -> usize {
        self.weight.ncols()
    }

    /// Number of learned scalars.
    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    /// Project (N x in) embeddings to (N x out).
    pub fn forward(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.in_channels() {
            return Err(Error::shape("regressor input", self.in_channels(), x.ncols()));
        }
        Ok(x.dot(&self.weight) + &self.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gnn::init::param_rng;
    use ndarray::array;

    #[test]
    fn test_affine_projection() {
        let reg = AgeRegressor::from_parameters(array![[1.0f32], [2.0]], array![20.0f32]).unwrap();
        let out = reg.forward(&array![[1.0f32, 1.0], [-3.0, 0.5]]).unwrap();
        assert_eq!(out, array![[23.0f32], [18.0]]);
    }

    #[test]
    fn test_no_activation() {
        let reg = AgeRegressor::from_parameters(array![[-1.0f32]], array![0.0f32]).unwrap();
        let out = reg.forward(&array![[5.0f32]]).unwrap();
        assert_eq!(out[[0, 0]], -5.0);
    }

    #[test]
    fn test_shapes_and_validation() {
        let reg = AgeRegressor::new(&mut param_rng(Some(0)), 32, 1);
        assert_eq!(reg.num_parameters(), 33);
        assert_eq!(reg.forward(&Array2::zeros((7, 32))).unwrap().shape(), &[7, 1]);
        assert!(reg.forward(&Array2::zeros((7, 16))).is_err());
        assert!(AgeRegressor::from_parameters(Array2::zeros((2, 2)), Array1::zeros(3)).is_err());
    }
}
