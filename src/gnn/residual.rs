//! Deep residual graph-convolution stack.
//!
//! Layer `i` computes, in order:
//!
//! 1. `x = conv_i(x)`
//! 2. for `i > 0`, the adaptive initial residual: `x += anchor`. Under
//!    [`InitialResidual::Rebinding`] the anchor then becomes this `x`, so
//!    from layer 2 on it holds the previous layer's pre-activation sum
//!    rather than the stack input. [`InitialResidual::FixedAnchor`] keeps
//!    the stack input.
//! 3. `x = relu(x)`
//! 4. for `i < L - 1`, the dynamic developmental residual:
//!    `x += conv_{i-1}(x)`. Layer 0 has no predecessor;
//!    [`FirstLayerDevelopmental`] decides whether the term is skipped or
//!    taken from the last layer.
//!
//! The last layer's output is returned after step 3.

use crate::config::{FirstLayerDevelopmental, InitialResidual, ResidualPolicy};
use crate::core::{Error, Result};
use crate::gnn::gcn::GcnConv;
use crate::gnn::message::MessageGraph;
use crate::monitoring::{ForwardObserver, ForwardStage};
use ndarray::Array2;
use rand::Rng;
use tracing::trace;

/// `L` graph-convolution layers with initial and developmental residuals.
#[derive(Clone, Debug)]
pub struct ResidualGraphStack {
    layers: Vec<GcnConv>,
    policy: ResidualPolicy,
}

impl ResidualGraphStack {
    /// Create `num_layers` hidden-width layers.
    ///
    /// Both residuals add tensors of the input width to hidden-width layer
    /// outputs, so `in_channels` must equal `hidden_channels`.
    pub fn new<R: Rng>(
        rng: &mut R,
        in_channels: usize,
        hidden_channels: usize,
        num_layers: usize,
        policy: ResidualPolicy,
    ) -> Result<Self> {
        if num_layers == 0 {
            return Err(Error::InvalidConfiguration(
                "residual stack needs at least one layer".to_string(),
            ));
        }
        if in_channels != hidden_channels {
            return Err(Error::InvalidConfiguration(format!(
                "residual stack input width {} must equal hidden width {}",
                in_channels, hidden_channels
            )));
        }

        let layers = (0..num_layers)
            .map(|_| GcnConv::new(rng, hidden_channels, hidden_channels))
            .collect();
        Ok(Self { layers, policy })
    }

    /// Assemble a stack from existing layers.
    pub fn from_layers(layers: Vec<GcnConv>, policy: ResidualPolicy) -> Result<Self> {
        let width = match layers.first() {
            Some(layer) => layer.out_channels(),
            None => {
                return Err(Error::InvalidConfiguration(
                    "residual stack needs at least one layer".to_string(),
                ))
            }
        };
        if let Some(bad) = layers
            .iter()
            .position(|l| l.in_channels() != width || l.out_channels() != width)
        {
            return Err(Error::InvalidConfiguration(format!(
                "residual layer {} is not {} -> {}",
                bad, width, width
            )));
        }
        Ok(Self { layers, policy })
    }

    /// Number of convolution layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Width of every layer, input and output alike.
    pub fn hidden_channels(&self) -> usize {
        self.layers[0].out_channels()
    }

    /// Residual rules applied between layers.
    pub fn policy(&self) -> ResidualPolicy {
        self.policy
    }

    /// Number of learned scalars.
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(GcnConv::num_parameters).sum()
    }

    /// The layer whose transform feeds the developmental residual of layer `i`.
    fn previous_layer(&self, i: usize) -> Option<&GcnConv> {
        if i > 0 {
            return self.layers.get(i - 1);
        }
        match self.policy.first_layer {
            FirstLayerDevelopmental::Skip => None,
            FirstLayerDevelopmental::WrapToLast => self.layers.last(),
        }
    }

    /// Run the stack, producing (N x hidden).
    pub fn forward(&self, x: &Array2<f32>, graph: &MessageGraph) -> Result<Array2<f32>> {
        self.forward_observed(x, graph, &mut crate::monitoring::NoopObserver)
    }

    /// Run the stack, reporting every layer output to `observer`.
    pub fn forward_observed<O: ForwardObserver + ?Sized>(
        &self,
        x: &Array2<f32>,
        graph: &MessageGraph,
        observer: &mut O,
    ) -> Result<Array2<f32>> {
        let last = self.layers.len() - 1;
        let mut initial_residual = x.clone();
        let mut x = x.clone();

        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x, graph)?;

            if i > 0 {
                x += &initial_residual;
                if self.policy.initial == InitialResidual::Rebinding {
                    initial_residual = x.clone();
                }
            }

            x.mapv_inplace(relu);

            if i < last {
                if let Some(previous) = self.previous_layer(i) {
                    let developmental = previous.forward(&x, graph)?;
                    x += &developmental;
                }
            }

            trace!(layer = i, "residual layer done");
            observer.observe(ForwardStage::ResidualLayer(i), &x);
        }

        Ok(x)
    }
}

/// Rectifier that lets NaN through.
fn relu(v: f32) -> f32 {
    if v < 0.0 {
        0.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gnn::init::param_rng;
    use crate::graph::Graph;
    use crate::monitoring::HealthReport;
    use ndarray::{array, Array1};

    fn isolated(n: usize) -> MessageGraph {
        let graph = Graph::unweighted(Array2::<f32>::zeros((n, 1)), vec![]).unwrap();
        MessageGraph::from_graph(&graph).unwrap()
    }

    fn scalar_layer(w: f32, b: f32) -> GcnConv {
        GcnConv::from_parameters(array![[w]], Array1::from_elem(1, b)).unwrap()
    }

    fn policy(initial: InitialResidual, first_layer: FirstLayerDevelopmental) -> ResidualPolicy {
        ResidualPolicy { initial, first_layer }
    }

    // On isolated nodes each 1x1 layer is just `w * x + b`, so every residual
    // rule can be followed by hand.
    fn three_layers(p: ResidualPolicy) -> ResidualGraphStack {
        ResidualGraphStack::from_layers(
            vec![scalar_layer(2.0, 0.0), scalar_layer(1.0, 0.0), scalar_layer(3.0, 0.0)],
            p,
        )
        .unwrap()
    }

    #[test]
    fn test_rebinding_initial_residual() {
        let stack = three_layers(policy(InitialResidual::Rebinding, FirstLayerDevelopmental::Skip));
        let out = stack.forward(&array![[1.0f32]], &isolated(1)).unwrap();
        // i=0: 2 -> relu 2 -> no developmental term -> 2
        // i=1: 2 + anchor 1 = 3 -> anchor 3 -> relu 3 -> + layer0(3) = 6 -> 9
        // i=2: 27 + anchor 3 = 30 -> relu 30
        assert!((out[[0, 0]] - 30.0).abs() < 1e-5);
    }

    #[test]
    fn test_fixed_anchor_initial_residual() {
        let stack = three_layers(policy(InitialResidual::FixedAnchor, FirstLayerDevelopmental::Skip));
        let out = stack.forward(&array![[1.0f32]], &isolated(1)).unwrap();
        // i=1: 2 + 1 = 3 -> relu 3 -> + 6 = 9
        // i=2: 27 + 1 = 28
        assert!((out[[0, 0]] - 28.0).abs() < 1e-5);
    }

    #[test]
    fn test_wraparound_developmental_residual() {
        let stack = three_layers(policy(InitialResidual::Rebinding, FirstLayerDevelopmental::WrapToLast));
        let out = stack.forward(&array![[1.0f32]], &isolated(1)).unwrap();
        // i=0: 2 -> relu 2 -> + layer2(2) = 6 -> 8
        // i=1: 8 + 1 = 9 -> anchor 9 -> relu 9 -> + layer0(9) = 18 -> 27
        // i=2: 81 + 9 = 90
        assert!((out[[0, 0]] - 90.0).abs() < 1e-5);
    }

    #[test]
    fn test_single_layer_has_no_residuals() {
        let stack = ResidualGraphStack::from_layers(
            vec![scalar_layer(-1.0, 0.5)],
            policy(InitialResidual::Rebinding, FirstLayerDevelopmental::WrapToLast),
        )
        .unwrap();
        let out = stack.forward(&array![[2.0f32], [0.25]], &isolated(2)).unwrap();
        assert_eq!(out, array![[0.0f32], [0.25]]);
    }

    #[test]
    fn test_output_shape_is_depth_invariant() {
        let graph = Graph::unweighted(
            Array2::<f32>::zeros((6, 1)),
            vec![(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0)],
        )
        .unwrap();
        let mg = MessageGraph::from_graph(&graph).unwrap();
        let x = Array2::from_shape_fn((6, 8), |(i, j)| ((i * 8 + j) as f32).sin());

        for depth in [1, 2, 5, 12] {
            let stack =
                ResidualGraphStack::new(&mut param_rng(Some(11)), 8, 8, depth, ResidualPolicy::default())
                    .unwrap();
            assert_eq!(stack.num_layers(), depth);
            let out = stack.forward(&x, &mg).unwrap();
            assert_eq!(out.shape(), &[6, 8]);
        }
    }

    #[test]
    fn test_nan_propagates_and_is_observed() {
        let stack = three_layers(ResidualPolicy::default());
        let mut report = HealthReport::new();
        let out = stack
            .forward_observed(&array![[f32::NAN]], &isolated(1), &mut report)
            .unwrap();
        assert!(out[[0, 0]].is_nan());
        assert_eq!(report.stages.len(), 3);
        assert_eq!(report.first_unhealthy().unwrap().stage, ForwardStage::ResidualLayer(0));
    }

    #[test]
    fn test_rejects_invalid_shapes() {
        let mut rng = param_rng(Some(1));
        assert!(ResidualGraphStack::new(&mut rng, 16, 32, 4, ResidualPolicy::default()).is_err());
        assert!(ResidualGraphStack::new(&mut rng, 32, 32, 0, ResidualPolicy::default()).is_err());
        assert!(ResidualGraphStack::from_layers(vec![], ResidualPolicy::default()).is_err());
        assert!(ResidualGraphStack::from_layers(
            vec![scalar_layer(1.0, 0.0), GcnConv::new(&mut rng, 2, 2)],
            ResidualPolicy::default()
        )
        .is_err());
    }

    #[test]
    fn test_relu_keeps_nan() {
        assert_eq!(relu(-2.0), 0.0);
        assert_eq!(relu(3.0), 3.0);
        assert!(relu(f32::NAN).is_nan());
    }
}
