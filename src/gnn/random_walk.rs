//! Random-walk diffusion over the weighted keypoint adjacency.
//!
//! Features are propagated `num_steps` times as `X <- A X` with the raw
//! similarity weights. No normalization is applied, so magnitudes scale with
//! weighted degree; on a graph without edges the output is all zeros after
//! the first step.

use crate::core::Result;
use crate::graph::SparseAdjacency;
use ndarray::Array2;
use tracing::trace;

/// Parameter-free multi-hop diffusion.
#[derive(Clone, Debug)]
pub struct RandomWalk {
    num_steps: usize,
}

impl RandomWalk {
    /// Create a diffuser running `num_steps` propagations.
    pub fn new(num_steps: usize) -> Self {
        Self { num_steps }
    }

    /// Number of propagation steps.
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Diffuse `x` (N x F) over `adjacency`. Shape is preserved.
    pub fn forward(&self, x: &Array2<f32>, adjacency: &SparseAdjacency) -> Result<Array2<f32>> {
        let mut x = x.clone();
        for step in 0..self.num_steps {
            x = adjacency.matmul(&x)?;
            trace!(step, nnz = adjacency.nnz(), "random walk step");
        }
        Ok(x)
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new(5)
    }
}
