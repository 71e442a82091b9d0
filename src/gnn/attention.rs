//! Multi-head latent-relation attention.
//!
//! Each head is an independent graph-attention convolution. For an edge
//! `j -> i` the head scores `LeakyReLU(a_src . h_j + a_dst . h_i)` with
//! `h = X W`, normalizes the scores with a softmax over the incoming edges
//! of `i`, and sums the weighted `h_j`. Head outputs are concatenated.

use crate::core::{Error, Result};
use crate::gnn::init::{glorot, glorot_vector};
use crate::gnn::message::MessageGraph;
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A single attention head.
#[derive(Clone, Debug)]
pub struct AttentionHead {
    /// Head index
    pub index: usize,
    /// Feature projection (in x dim)
    weight: Array2<f32>,
    /// Source-side attention vector
    att_src: Array1<f32>,
    /// Destination-side attention vector
    att_dst: Array1<f32>,
    /// Output bias
    bias: Array1<f32>,
    /// LeakyReLU slope for scores
    negative_slope: f32,
}

impl AttentionHead {
    /// Create a new attention head with Glorot initialization.
    pub fn new<R: Rng>(
        rng: &mut R,
        index: usize,
        in_channels: usize,
        head_dim: usize,
        negative_slope: f32,
    ) -> Self {
        Self {
            index,
            weight: glorot(rng, in_channels, head_dim),
            att_src: glorot_vector(rng, head_dim),
            att_dst: glorot_vector(rng, head_dim),
            bias: Array1::zeros(head_dim),
            negative_slope,
        }
    }

    /// Create a head from explicit parameters.
    ///
    /// `att_src`, `att_dst` and `bias` must match the projection width.
    pub fn from_parameters(
        index: usize,
        weight: Array2<f32>,
        att_src: Array1<f32>,
        att_dst: Array1<f32>,
        bias: Array1<f32>,
        negative_slope: f32,
    ) -> Result<Self> {
        let dim = weight.ncols();
        if att_src.len() != dim {
            return Err(Error::shape("attention source vector", dim, att_src.len()));
        }
        if att_dst.len() != dim {
            return Err(Error::shape("attention destination vector", dim, att_dst.len()));
        }
        if bias.len() != dim {
            return Err(Error::shape("attention bias", dim, bias.len()));
        }
        if !negative_slope.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "negative slope {} is not finite",
                negative_slope
            )));
        }
        Ok(Self {
            index,
            weight,
            att_src,
            att_dst,
            bias,
            negative_slope,
        })
    }

    /// Output width of this head.
    pub fn dim(&self) -> usize {
        self.weight.ncols()
    }

    /// Number of learned scalars.
    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.att_src.len() + self.att_dst.len() + self.bias.len()
    }

    /// Projected features and per-node source/destination scores.
    fn project(&self, x: &Array2<f32>) -> (Array2<f32>, Array1<f32>, Array1<f32>) {
        let h = x.dot(&self.weight);
        let src_scores = h.dot(&self.att_src);
        let dst_scores = h.dot(&self.att_dst);
        (h, src_scores, dst_scores)
    }

    /// Softmax-normalized coefficients of the edges entering `node`.
    fn coefficients(
        &self,
        graph: &MessageGraph,
        node: usize,
        src_scores: &Array1<f32>,
        dst_scores: &Array1<f32>,
    ) -> Vec<f32> {
        let (sources, _) = graph.incoming(node);
        let mut scores: Vec<f32> = sources
            .iter()
            .map(|&j| leaky_relu(src_scores[j] + dst_scores[node], self.negative_slope))
            .collect();
        softmax(&mut scores);
        scores
    }

    /// Attend over `graph`, producing (N x dim).
    pub fn forward(&self, x: &Array2<f32>, graph: &MessageGraph) -> Array2<f32> {
        let (h, src_scores, dst_scores) = self.project(x);
        let mut out = Array2::<f32>::zeros((x.nrows(), self.dim()));

        for (node, mut out_row) in out.outer_iter_mut().enumerate() {
            let alpha = self.coefficients(graph, node, &src_scores, &dst_scores);
            let (sources, _) = graph.incoming(node);
            for (&j, &a) in sources.iter().zip(&alpha) {
                out_row.scaled_add(a, &h.row(j));
            }
            out_row += &self.bias;
        }
        out
    }
}

/// Attention weight of one edge in one head, for interpretability.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttentionWeights {
    /// Source node index
    pub source: usize,
    /// Target node index
    pub target: usize,
    /// Attention weight
    pub weight: f32,
    /// Head index
    pub head: usize,
}

/// Independent attention heads whose outputs are concatenated.
#[derive(Clone, Debug)]
pub struct MultiHeadLatentAttention {
    /// Attention heads
    heads: Vec<AttentionHead>,
    /// Input width
    in_channels: usize,
    /// Concatenated output width
    out_channels: usize,
}

impl MultiHeadLatentAttention {
    /// Create `num_heads` heads of width `out_channels / num_heads`.
    ///
    /// `out_channels` must be a positive multiple of `num_heads`.
    pub fn new<R: Rng>(
        rng: &mut R,
        in_channels: usize,
        out_channels: usize,
        num_heads: usize,
        negative_slope: f32,
    ) -> Result<Self> {
        if num_heads == 0 || out_channels == 0 || out_channels % num_heads != 0 {
            return Err(Error::InvalidConfiguration(format!(
                "attention width {} must be a positive multiple of {} heads",
                out_channels, num_heads
            )));
        }
        let head_dim = out_channels / num_heads;
        let heads = (0..num_heads)
            .map(|i| AttentionHead::new(rng, i, in_channels, head_dim, negative_slope))
            .collect();

        Ok(Self {
            heads,
            in_channels,
            out_channels,
        })
    }

    /// Number of attention heads.
    pub fn num_heads(&self) -> usize {
        self.heads.len()
    }

    /// Heads in concatenation order.
    pub fn heads(&self) -> &[AttentionHead] {
        &self.heads
    }

    /// Input feature width.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Concatenated output width.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Number of learned scalars.
    pub fn num_parameters(&self) -> usize {
        self.heads.iter().map(AttentionHead::num_parameters).sum()
    }

    fn check_input(&self, x: &Array2<f32>, graph: &MessageGraph) -> Result<()> {
        if x.ncols() != self.in_channels {
            return Err(Error::shape("attention input width", self.in_channels, x.ncols()));
        }
        if x.nrows() != graph.num_nodes() {
            return Err(Error::shape("attention input rows", graph.num_nodes(), x.nrows()));
        }
        Ok(())
    }

    /// Run every head and concatenate along features: (N x out_channels).
    pub fn forward(&self, x: &Array2<f32>, graph: &MessageGraph) -> Result<Array2<f32>> {
        self.check_input(x, graph)?;
        let outputs: Vec<Array2<f32>> = self.heads.iter().map(|head| head.forward(x, graph)).collect();
        let views: Vec<ArrayView2<f32>> = outputs.iter().map(|o| o.view()).collect();
        concatenate(Axis(1), &views).map_err(|e| Error::shape("attention concat", self.out_channels, e))
    }

    /// Per-head, per-edge attention coefficients.
    pub fn attention_weights(&self, x: &Array2<f32>, graph: &MessageGraph) -> Result<Vec<AttentionWeights>> {
        self.check_input(x, graph)?;
        let mut weights = Vec::with_capacity(self.heads.len() * graph.num_edges());

        for head in &self.heads {
            let (_, src_scores, dst_scores) = head.project(x);
            for node in 0..graph.num_nodes() {
                let alpha = head.coefficients(graph, node, &src_scores, &dst_scores);
                let (sources, _) = graph.incoming(node);
                for (&source, &weight) in sources.iter().zip(&alpha) {
                    weights.push(AttentionWeights {
                        source,
                        target: node,
                        weight,
                        head: head.index,
                    });
                }
            }
        }

        Ok(weights)
    }
}

fn leaky_relu(v: f32, negative_slope: f32) -> f32 {
    if v < 0.0 {
        v * negative_slope
    } else {
        v
    }
}

/// Apply softmax to a vector in-place.
fn softmax(scores: &mut [f32]) {
    if scores.is_empty() {
        return;
    }

    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;

    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }

    for s in scores.iter_mut() {
        *s /= sum;
    }
}
