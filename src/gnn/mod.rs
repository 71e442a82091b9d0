//! Graph Neural Network (GNN) Module
//!
//! The layers of the latent relation-aware network:
//! - Random-walk diffusion for multi-hop structural context
//! - Multi-head graph attention for latent relation types
//! - Deep residual graph convolution stack
//! - Age regressor and the composed `LraGnn` pipeline

pub mod attention;
pub mod gcn;
pub mod init;
pub mod message;
pub mod model;
pub mod random_walk;
pub mod regressor;
pub mod residual;

pub use attention::{AttentionHead, AttentionWeights, MultiHeadLatentAttention};
pub use gcn::GcnConv;
pub use message::MessageGraph;
pub use model::LraGnn;
pub use random_walk::RandomWalk;
pub use regressor::AgeRegressor;
pub use residual::ResidualGraphStack;
