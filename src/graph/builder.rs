//! Keypoint graph construction.
//!
//! Two keypoints are connected when their normalized similarity
//! `1 - distance / diagonal` exceeds a threshold. Distance is symmetric, so
//! the edge set is symmetric too, and every node carries a self-loop of
//! weight 1 unless the threshold is at least 1.

use crate::config::GraphConfig;
use crate::core::{Error, ImageSize, Keypoint, Result};
use crate::graph::Graph;
use ndarray::Array2;
use tracing::{debug, warn};

/// Builds similarity graphs from facial keypoints.
#[derive(Clone, Debug)]
pub struct GraphBuilder {
    config: GraphConfig,
}

impl GraphBuilder {
    /// Create a builder, rejecting unusable thresholds and frame sizes.
    pub fn new(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Builder configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Similarity of two keypoints relative to the reference frame.
    pub fn similarity(&self, a: &Keypoint, b: &Keypoint) -> f32 {
        1.0 - a.distance(b) / self.config.image_size.diagonal()
    }

    /// Pairwise similarity matrix (N x N).
    pub fn similarity_matrix(&self, keypoints: &[Keypoint]) -> Array2<f32> {
        let n = keypoints.len();
        Array2::from_shape_fn((n, n), |(i, j)| self.similarity(&keypoints[i], &keypoints[j]))
    }

    /// Build a graph from an ordered keypoint set.
    pub fn build(&self, keypoints: &[Keypoint]) -> Result<Graph> {
        if keypoints.is_empty() {
            return Err(Error::MalformedInput("keypoint set is empty".to_string()));
        }
        if let Some(i) = keypoints.iter().position(|k| !k.is_finite()) {
            return Err(Error::MalformedInput(format!(
                "keypoint {} has non-finite coordinates",
                i
            )));
        }

        let similarity = self.similarity_matrix(keypoints);
        let mut edge_index = Vec::new();
        let mut edge_weights = Vec::new();
        for ((i, j), &s) in similarity.indexed_iter() {
            if s > self.config.threshold {
                edge_index.push((i, j));
                edge_weights.push(s);
            }
        }

        let node_features =
            Array2::from_shape_fn((keypoints.len(), 2), |(i, c)| match c {
                0 => keypoints[i].x,
                _ => keypoints[i].y,
            });

        if edge_index.is_empty() {
            warn!(
                nodes = keypoints.len(),
                threshold = self.config.threshold,
                "no keypoint pair exceeds the similarity threshold; graph has no edges"
            );
        }
        debug!(
            nodes = keypoints.len(),
            edges = edge_index.len(),
            image_size = %self.config.image_size,
            "built keypoint graph"
        );

        Graph::new(node_features, edge_index, edge_weights)
    }

    /// Build from an (N x 2) coordinate matrix.
    pub fn build_from_array(&self, keypoints: &Array2<f32>) -> Result<Graph> {
        if keypoints.ncols() != 2 {
            return Err(Error::shape(
                "keypoints",
                "(N, 2)",
                format!("{:?}", keypoints.shape()),
            ));
        }
        let points: Vec<Keypoint> = keypoints
            .outer_iter()
            .map(|row| Keypoint::new(row[0], row[1]))
            .collect();
        self.build(&points)
    }
}

/// Build a keypoint graph with an explicit frame and threshold.
pub fn build_graph(keypoints: &[Keypoint], image_size: ImageSize, threshold: f32) -> Result<Graph> {
    GraphBuilder::new(GraphConfig {
        threshold,
        image_size,
    })?
    .build(keypoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn face_keypoints() -> Vec<Keypoint> {
        vec![
            Keypoint::new(50.0, 50.0),
            Keypoint::new(100.0, 50.0),
            Keypoint::new(75.0, 100.0),
            Keypoint::new(125.0, 100.0),
        ]
    }

    #[test]
    fn test_four_keypoint_scenario_has_only_self_loops() {
        let graph = build_graph(&face_keypoints(), ImageSize::new(224, 224), 0.936).unwrap();

        assert_eq!(graph.node_features().shape(), &[4, 2]);
        assert_eq!(graph.node_features()[[2, 0]], 75.0);
        assert_eq!(graph.node_features()[[3, 1]], 100.0);
        assert_eq!(graph.edge_index(), &[(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert_eq!(graph.edge_attr().shape(), &[4, 1]);
        assert!(graph.edge_weights().iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_far_apart_points_yield_only_self_loops() {
        let size = ImageSize::new(224, 224);
        let threshold = 0.9;
        let min_gap = size.diagonal() * (1.0 - threshold);
        let points: Vec<Keypoint> = (0..5)
            .map(|i| Keypoint::new(i as f32 * (min_gap + 1.0), 0.0))
            .collect();

        let graph = build_graph(&points, size, threshold).unwrap();
        assert_eq!(graph.num_edges(), 5);
        assert!(graph.edge_index().iter().all(|(s, t)| s == t));
    }

    #[test]
    fn test_edge_weights_follow_similarity_formula() {
        let builder = GraphBuilder::new(GraphConfig {
            threshold: 0.9,
            image_size: ImageSize::new(100, 100),
        })
        .unwrap();
        let points = vec![
            Keypoint::new(10.0, 10.0),
            Keypoint::new(12.0, 11.0),
            Keypoint::new(20.0, 10.0),
            Keypoint::new(90.0, 90.0),
        ];
        let graph = builder.build(&points).unwrap();

        for (&(i, j), &w) in graph.edge_index().iter().zip(graph.edge_weights()) {
            let expected = 1.0 - points[i].distance(&points[j]) / ImageSize::new(100, 100).diagonal();
            assert_eq!(w, expected);
            assert!(w > 0.9);
        }
        for i in 0..points.len() {
            for j in 0..points.len() {
                let present = graph.edge_index().contains(&(i, j));
                assert_eq!(present, builder.similarity(&points[i], &points[j]) > 0.9);
            }
        }
        assert!(graph.edge_index().contains(&(0, 1)));
        assert!(graph.edge_index().contains(&(0, 2)));
        assert!(!graph.edge_index().contains(&(0, 3)));
    }

    #[test]
    fn test_similarity_graph_is_symmetric() {
        let points = vec![
            Keypoint::new(100.0, 100.0),
            Keypoint::new(104.0, 103.0),
            Keypoint::new(110.0, 98.0),
            Keypoint::new(200.0, 30.0),
        ];
        let graph = build_graph(&points, ImageSize::default(), 0.936).unwrap();
        assert!(graph.num_edges() > points.len());
        assert!(graph.is_symmetric().unwrap());
    }

    #[test]
    fn test_build_is_deterministic() {
        let points = face_keypoints();
        let a = build_graph(&points, ImageSize::new(120, 80), 0.5).unwrap();
        let b = build_graph(&points, ImageSize::new(120, 80), 0.5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_threshold_one_drops_self_loops() {
        let graph = build_graph(&face_keypoints(), ImageSize::default(), 1.0).unwrap();
        assert!(graph.is_degenerate());
        assert_eq!(graph.num_nodes(), 4);
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(
            build_graph(&[], ImageSize::default(), 0.936),
            Err(Error::MalformedInput(_))
        ));
        assert!(matches!(
            build_graph(&[Keypoint::new(f32::NAN, 1.0)], ImageSize::default(), 0.936),
            Err(Error::MalformedInput(_))
        ));

        let builder = GraphBuilder::new(GraphConfig::default()).unwrap();
        let wrong_rank = array![[1.0f32, 2.0, 3.0]];
        assert!(matches!(
            builder.build_from_array(&wrong_rank),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(build_graph(&face_keypoints(), ImageSize::new(0, 0), 0.936).is_err());
        assert!(build_graph(&face_keypoints(), ImageSize::default(), f32::NAN).is_err());
    }

    #[test]
    fn test_build_from_array() {
        let builder = GraphBuilder::new(GraphConfig::default()).unwrap();
        let arr = array![[50.0f32, 50.0], [100.0, 50.0], [75.0, 100.0], [125.0, 100.0]];
        let from_array = builder.build_from_array(&arr).unwrap();
        let from_points = builder.build(&face_keypoints()).unwrap();
        assert_eq!(from_array, from_points);
    }
}
