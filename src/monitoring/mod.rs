//! Monitoring Module
//!
//! Provides observability for LRA-GNN:
//! - Structured logging via `tracing`
//! - Numerical health checks over forward passes

pub mod health;
pub mod logging;

pub use health::{ForwardObserver, ForwardStage, HealthReport, NoopObserver, StageHealth, TensorStats};
pub use logging::{init_logging, LogFormat, LogLevel, LoggerConfig};
