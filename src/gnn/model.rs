//! The LRA-GNN forward pipeline.
//!
//! Random walk -> multi-head latent attention -> residual graph stack ->
//! age regressor, strictly in that order.

use crate::config::ModelConfig;
use crate::core::{Error, Result};
use crate::gnn::attention::{AttentionWeights, MultiHeadLatentAttention};
use crate::gnn::init::param_rng;
use crate::gnn::message::MessageGraph;
use crate::gnn::random_walk::RandomWalk;
use crate::gnn::regressor::AgeRegressor;
use crate::gnn::residual::ResidualGraphStack;
use crate::graph::Graph;
use crate::monitoring::{ForwardObserver, ForwardStage, HealthReport, NoopObserver};
use ndarray::Array2;
use tracing::{debug, trace};

/// Latent Relation-Aware Graph Neural Network.
///
/// Parameters are fixed after construction; every forward method takes
/// `&self` and keeps no state between calls.
#[derive(Clone, Debug)]
pub struct LraGnn {
    config: ModelConfig,
    random_walk: RandomWalk,
    attention: MultiHeadLatentAttention,
    residual: ResidualGraphStack,
    regressor: AgeRegressor,
}

impl LraGnn {
    /// Build and initialize the network. Invalid configurations fail here.
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = param_rng(config.seed);

        let random_walk = RandomWalk::new(config.num_steps);
        let attention = MultiHeadLatentAttention::new(
            &mut rng,
            config.in_channels,
            config.hidden_channels,
            config.num_heads,
            config.negative_slope,
        )?;
        let residual = ResidualGraphStack::new(
            &mut rng,
            config.hidden_channels,
            config.hidden_channels,
            config.num_layers,
            config.residual,
        )?;
        let regressor = AgeRegressor::new(&mut rng, config.hidden_channels, config.out_channels);

        let model = Self {
            config,
            random_walk,
            attention,
            residual,
            regressor,
        };
        debug!(
            layers = model.config.num_layers,
            heads = model.config.num_heads,
            parameters = model.num_parameters(),
            "initialized LRA-GNN"
        );
        Ok(model)
    }

    /// Configuration the model was built from.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Diffusion stage.
    pub fn random_walk(&self) -> &RandomWalk {
        &self.random_walk
    }

    /// Attention stage.
    pub fn attention(&self) -> &MultiHeadLatentAttention {
        &self.attention
    }

    /// Residual convolution stack.
    pub fn residual(&self) -> &ResidualGraphStack {
        &self.residual
    }

    /// Output head.
    pub fn regressor(&self) -> &AgeRegressor {
        &self.regressor
    }

    /// Total number of learned scalars.
    pub fn num_parameters(&self) -> usize {
        self.attention.num_parameters() + self.residual.num_parameters() + self.regressor.num_parameters()
    }

    fn check_graph(&self, graph: &Graph) -> Result<()> {
        if graph.feature_dim() != self.config.in_channels {
            return Err(Error::shape(
                "graph node features",
                format!("{} channels", self.config.in_channels),
                format!("{} channels", graph.feature_dim()),
            ));
        }
        Ok(())
    }

    fn embed_observed<O: ForwardObserver + ?Sized>(
        &self,
        graph: &Graph,
        observer: &mut O,
    ) -> Result<Array2<f32>> {
        self.check_graph(graph)?;
        debug!(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            "LRA-GNN forward"
        );

        let adjacency = graph.adjacency()?;
        let messages = MessageGraph::from_graph(graph)?;

        let x = self.random_walk.forward(graph.node_features(), &adjacency)?;
        trace!("random walk done");
        observer.observe(ForwardStage::RandomWalk, &x);

        let x = self.attention.forward(&x, &messages)?;
        trace!("attention done");
        observer.observe(ForwardStage::Attention, &x);

        self.residual.forward_observed(&x, &messages, observer)
    }

    /// Node embeddings after the residual stack (N x hidden).
    pub fn embed(&self, graph: &Graph) -> Result<Array2<f32>> {
        self.embed_observed(graph, &mut NoopObserver)
    }

    /// Per-node predictions (N x out_channels).
    pub fn forward(&self, graph: &Graph) -> Result<Array2<f32>> {
        self.forward_observed(graph, &mut NoopObserver)
    }

    /// Forward pass reporting each stage output to `observer`.
    pub fn forward_observed<O: ForwardObserver + ?Sized>(
        &self,
        graph: &Graph,
        observer: &mut O,
    ) -> Result<Array2<f32>> {
        let embedding = self.embed_observed(graph, observer)?;
        let out = self.regressor.forward(&embedding)?;
        observer.observe(ForwardStage::Regressor, &out);
        Ok(out)
    }

    /// Forward pass with a health report.
    ///
    /// Returns [`Error::NumericalInstability`] naming the first stage that
    /// produced NaN or infinite values.
    pub fn forward_checked(&self, graph: &Graph) -> Result<(Array2<f32>, HealthReport)> {
        let mut report = HealthReport::new();
        let out = self.forward_observed(graph, &mut report)?;
        let report = report.into_result()?;
        Ok((out, report))
    }

    /// Attention coefficients over the diffused features, for interpretability.
    pub fn attention_weights(&self, graph: &Graph) -> Result<Vec<AttentionWeights>> {
        self.check_graph(graph)?;
        let adjacency = graph.adjacency()?;
        let messages = MessageGraph::from_graph(graph)?;
        let x = self.random_walk.forward(graph.node_features(), &adjacency)?;
        self.attention.attention_weights(&x, &messages)
    }
}
