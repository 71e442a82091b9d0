//! Keypoint graphs.
//!
//! Provides the graph representation consumed by the network:
//! - `Graph`: node features, directed edge list and aligned edge weights
//! - `GraphBuilder`: similarity-threshold construction from facial keypoints
//! - `SparseAdjacency`: compressed sparse row adjacency for propagation

pub mod builder;
pub mod sparse;

pub use builder::{build_graph, GraphBuilder};
pub use sparse::SparseAdjacency;

use crate::core::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A directed, weighted graph over N nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Node features (N x F)
    node_features: Array2<f32>,
    /// Directed `(source, target)` pairs, unique per pair
    edge_index: Vec<(usize, usize)>,
    /// Edge weights aligned with `edge_index`
    edge_weights: Vec<f32>,
}

impl Graph {
    /// Create a graph, validating indices, weight alignment and edge uniqueness.
    pub fn new(
        node_features: Array2<f32>,
        edge_index: Vec<(usize, usize)>,
        edge_weights: Vec<f32>,
    ) -> Result<Self> {
        let graph = Self {
            node_features,
            edge_index,
            edge_weights,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Create a graph whose edges all carry weight 1.
    pub fn unweighted(node_features: Array2<f32>, edge_index: Vec<(usize, usize)>) -> Result<Self> {
        let weights = vec![1.0; edge_index.len()];
        Self::new(node_features, edge_index, weights)
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<()> {
        let n = self.num_nodes();
        if n == 0 {
            return Err(Error::MalformedInput("graph has no nodes".to_string()));
        }
        if self.edge_weights.len() != self.edge_index.len() {
            return Err(Error::shape(
                "edge weights",
                format!("{} weights", self.edge_index.len()),
                format!("{} weights", self.edge_weights.len()),
            ));
        }

        if let Some(pos) = self.edge_weights.iter().position(|w| !w.is_finite()) {
            return Err(Error::MalformedInput(format!(
                "edge {:?} has non-finite weight {}",
                self.edge_index[pos], self.edge_weights[pos]
            )));
        }

        let mut seen = HashSet::with_capacity(self.edge_index.len());
        for &(src, dst) in &self.edge_index {
            if src >= n || dst >= n {
                return Err(Error::MalformedInput(format!(
                    "edge ({}, {}) out of range for {} nodes",
                    src, dst, n
                )));
            }
            if !seen.insert((src, dst)) {
                return Err(Error::MalformedInput(format!(
                    "duplicate edge ({}, {})",
                    src, dst
                )));
            }
        }
        Ok(())
    }

    /// Replace node features, keeping the edges.
    ///
    /// Used when learned features stand in for raw coordinates.
    pub fn with_node_features(mut self, node_features: Array2<f32>) -> Result<Self> {
        if node_features.nrows() != self.num_nodes() {
            return Err(Error::shape(
                "node features",
                format!("{} rows", self.num_nodes()),
                format!("{} rows", node_features.nrows()),
            ));
        }
        self.node_features = node_features;
        Ok(self)
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.node_features.nrows()
    }

    /// Number of directed edges.
    pub fn num_edges(&self) -> usize {
        self.edge_index.len()
    }

    /// Node feature width.
    pub fn feature_dim(&self) -> usize {
        self.node_features.ncols()
    }

    /// Node features (N x F).
    pub fn node_features(&self) -> &Array2<f32> {
        &self.node_features
    }

    /// Directed edge list.
    pub fn edge_index(&self) -> &[(usize, usize)] {
        &self.edge_index
    }

    /// Edge weights, aligned with `edge_index`.
    pub fn edge_weights(&self) -> &[f32] {
        &self.edge_weights
    }

    /// Edge features as an (E x 1) matrix.
    pub fn edge_attr(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.num_edges(), 1), |(e, _)| self.edge_weights[e])
    }

    /// Whether the graph has no edges at all.
    pub fn is_degenerate(&self) -> bool {
        self.edge_index.is_empty()
    }

    /// Weighted adjacency, rows = source, columns = target.
    pub fn adjacency(&self) -> Result<SparseAdjacency> {
        SparseAdjacency::from_coo(self.num_nodes(), &self.edge_index, &self.edge_weights)
    }

    /// Whether every edge has a reverse edge with the same weight.
    pub fn is_symmetric(&self) -> Result<bool> {
        Ok(self.adjacency()?.is_symmetric())
    }

    /// Edges with every existing self-loop removed and exactly one added per node.
    pub fn edges_with_self_loops(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self
            .edge_index
            .iter()
            .copied()
            .filter(|(src, dst)| src != dst)
            .collect();
        edges.extend((0..self.num_nodes()).map(|i| (i, i)));
        edges
    }

    /// Encode to a compact binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from `to_bytes` output, re-checking invariants.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let graph: Graph = bincode::deserialize(bytes)
            .map_err(|e| Error::DeserializationError(e.to_string()))?;
        graph.validate()?;
        Ok(graph)
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON, re-checking invariants.
    pub fn from_json(json: &str) -> Result<Self> {
        let graph: Graph = serde_json::from_str(json)?;
        graph.validate()?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ring(n: usize, dim: usize) -> Graph {
        let x = Array2::from_shape_fn((n, dim), |(i, j)| (i * dim + j) as f32);
        let edges = (0..n).map(|i| (i, (i + 1) % n)).collect();
        Graph::unweighted(x, edges).unwrap()
    }

    #[test]
    fn test_graph_creation() {
        let g = ring(4, 3);
        assert_eq!(g.num_nodes(), 4);
        assert_eq!(g.num_edges(), 4);
        assert_eq!(g.feature_dim(), 3);
        assert!(g.edge_weights().iter().all(|&w| w == 1.0));
        assert!(!g.is_degenerate());
    }

    #[test]
    fn test_graph_rejects_bad_edges() {
        let x = Array2::<f32>::zeros((2, 2));
        assert!(matches!(
            Graph::unweighted(x.clone(), vec![(0, 2)]),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            Graph::unweighted(x.clone(), vec![(0, 1), (0, 1)]),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            Graph::new(x, vec![(0, 1)], vec![0.5, 0.5]),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(Graph::unweighted(Array2::<f32>::zeros((0, 2)), vec![]).is_err());
    }

    #[test]
    fn test_graph_rejects_non_finite_weights() {
        let x = Array2::<f32>::zeros((2, 2));
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(matches!(
                Graph::new(x.clone(), vec![(0, 1), (1, 0)], vec![0.5, bad]),
                Err(Error::MalformedInput(_))
            ));
        }
        assert!(Graph::new(x, vec![(0, 1)], vec![0.0]).is_ok());
    }

    #[test]
    fn test_edge_attr_shape() {
        let g = Graph::new(
            Array2::<f32>::zeros((2, 2)),
            vec![(0, 0), (0, 1)],
            vec![1.0, 0.95],
        )
        .unwrap();
        assert_eq!(g.edge_attr(), array![[1.0f32], [0.95]]);
    }

    #[test]
    fn test_with_node_features() {
        let g = ring(3, 2);
        let learned = Array2::<f32>::ones((3, 16));
        let g = g.with_node_features(learned).unwrap();
        assert_eq!(g.feature_dim(), 16);
        assert_eq!(g.num_edges(), 3);

        assert!(g.with_node_features(Array2::<f32>::ones((4, 16))).is_err());
    }

    #[test]
    fn test_edges_with_self_loops() {
        let g = Graph::unweighted(Array2::<f32>::zeros((3, 1)), vec![(0, 0), (0, 1)]).unwrap();
        let edges = g.edges_with_self_loops();
        assert_eq!(edges, vec![(0, 1), (0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_ring_is_not_symmetric() {
        assert!(!ring(5, 1).is_symmetric().unwrap());
    }

    #[test]
    fn test_binary_and_json_encoding() {
        let g = ring(4, 2);
        assert_eq!(Graph::from_bytes(&g.to_bytes().unwrap()).unwrap(), g);
        assert_eq!(Graph::from_json(&g.to_json().unwrap()).unwrap(), g);
    }

    #[test]
    fn test_from_json_revalidates() {
        let json = r#"{"node_features":{"v":1,"dim":[2,1],"data":[0.0,1.0]},"edge_index":[[0,5]],"edge_weights":[1.0]}"#;
        assert!(matches!(Graph::from_json(json), Err(Error::MalformedInput(_))));
    }
}
