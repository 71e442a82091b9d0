//! Graph convolution layer.

use crate::core::{Error, Result};
use crate::gnn::init::glorot;
use crate::gnn::message::MessageGraph;
use ndarray::{Array1, Array2};
use rand::Rng;

/// Graph convolution: `D^-1/2 (A + I) D^-1/2 X W + b`.
#[derive(Clone, Debug)]
pub struct GcnConv {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl GcnConv {
    /// Create a layer with Glorot weights and zero bias.
    pub fn new<R: Rng>(rng: &mut R, in_channels: usize, out_channels: usize) -> Self {
        Self {
            weight: glorot(rng, in_channels, out_channels),
            bias: Array1::zeros(out_channels),
        }
    }

    /// Create a layer from explicit parameters.
    pub fn from_parameters(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if bias.len() != weight.ncols() {
            return Err(Error::shape("gcn bias", weight.ncols(), bias.len()));
        }
        Ok(Self { weight, bias })
    }

    /// Input feature width.
    pub fn in_channels(&self) -> usize {
        self.weight.nrows()
    }

    /// Output feature width.
    pub fn out_channels(&self) -> usize {
        self.weight.ncols()
    }

    /// Number of learned scalars.
    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    /// Convolve `x` (N x in) to (N x out).
    pub fn forward(&self, x: &Array2<f32>, graph: &MessageGraph) -> Result<Array2<f32>> {
        if x.ncols() != self.in_channels() {
            return Err(Error::shape("gcn input", self.in_channels(), x.ncols()));
        }
        let h = x.dot(&self.weight);
        let mut out = graph.aggregate(&h)?;
        out += &self.bias;
        Ok(out)
    }
}
