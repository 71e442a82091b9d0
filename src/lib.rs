//! # LRA-GNN - Latent Relation-Aware Graph Neural Network
//!
//! Facial age estimation core:
//! - **Graph**: similarity-threshold graphs over facial keypoints
//! - **GNN**: random-walk diffusion, multi-head latent attention, a deep
//!   residual graph-convolution stack and an age regressor
//! - **Monitoring**: `tracing` setup and numerical health checks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lra_gnn::config::ModelConfig;
//! use lra_gnn::core::{ImageSize, Keypoint};
//! use lra_gnn::graph::build_graph;
//! use lra_gnn::gnn::LraGnn;
//!
//! fn main() -> lra_gnn::Result<()> {
//!     let keypoints = vec![
//!         Keypoint::new(50.0, 50.0),
//!         Keypoint::new(100.0, 50.0),
//!         Keypoint::new(75.0, 100.0),
//!         Keypoint::new(125.0, 100.0),
//!     ];
//!     let graph = build_graph(&keypoints, ImageSize::new(224, 224), 0.936)?;
//!
//!     let model = LraGnn::new(ModelConfig {
//!         in_channels: 2,
//!         out_channels: 1,
//!         ..Default::default()
//!     })?;
//!     let ages = model.forward(&graph)?;
//!     println!("per-node age estimates: {:?}", ages);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod gnn;
pub mod graph;
pub mod monitoring;

pub use crate::core::error::{Error, Result};
pub use gnn::LraGnn;
pub use graph::{build_graph, Graph, GraphBuilder};
