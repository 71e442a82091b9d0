//! Message-passing structure shared by attention and convolution layers.
//!
//! Both layers read the graph structure only: existing self-loops are
//! dropped, exactly one is added per node, and edges are grouped by
//! destination. Each entry carries the symmetric GCN normalization
//! `1 / sqrt(deg(src) * deg(dst))` with `deg` the in-degree including the
//! self-loop. An edgeless graph reduces to self-loops only, so every node
//! still aggregates its own features.

use crate::core::Result;
use crate::graph::{Graph, SparseAdjacency};
use ndarray::Array2;

/// Incoming-edge view of a graph with self-loops.
#[derive(Clone, Debug)]
pub struct MessageGraph {
    /// Row = destination, column = source, value = normalization
    incoming: SparseAdjacency,
}

impl MessageGraph {
    /// Derive the message-passing structure of `graph`.
    pub fn from_graph(graph: &Graph) -> Result<Self> {
        let n = graph.num_nodes();
        let edges = graph.edges_with_self_loops();

        let mut in_degree = vec![0usize; n];
        for &(_, dst) in &edges {
            in_degree[dst] += 1;
        }

        let entries: Vec<(usize, usize)> = edges.iter().map(|&(src, dst)| (dst, src)).collect();
        let norms: Vec<f32> = edges
            .iter()
            .map(|&(src, dst)| 1.0 / ((in_degree[src] * in_degree[dst]) as f32).sqrt())
            .collect();

        Ok(Self {
            incoming: SparseAdjacency::from_coo(n, &entries, &norms)?,
        })
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.incoming.num_nodes()
    }

    /// Number of message edges, self-loops included.
    pub fn num_edges(&self) -> usize {
        self.incoming.nnz()
    }

    /// Sources sending to `node`, with their normalization.
    ///
    /// # Panics
    ///
    /// Panics if `node >= self.num_nodes()`.
    pub fn incoming(&self, node: usize) -> (&[usize], &[f32]) {
        self.incoming.row(node)
    }

    /// Normalized neighborhood sum, `D^-1/2 (A + I) D^-1/2 h`.
    pub fn aggregate(&self, h: &Array2<f32>) -> Result<Array2<f32>> {
        self.incoming.matmul(h)
    }
}
