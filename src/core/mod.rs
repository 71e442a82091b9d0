//! Core utilities and common types for LRA-GNN.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
