//! Numerical health checks for the forward pass.
//!
//! The network never rewrites NaN or infinite values. Instead every stage
//! output is offered to a [`ForwardObserver`], and [`HealthReport`] is the
//! observer that records per-stage statistics.

use crate::core::{now, Error, Result, Timestamp};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A point in the forward pipeline whose output can be observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForwardStage {
    RandomWalk,
    Attention,
    ResidualLayer(usize),
    Regressor,
}

impl std::fmt::Display for ForwardStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardStage::RandomWalk => write!(f, "random_walk"),
            ForwardStage::Attention => write!(f, "attention"),
            ForwardStage::ResidualLayer(i) => write!(f, "residual_layer_{}", i),
            ForwardStage::Regressor => write!(f, "regressor"),
        }
    }
}

/// Summary statistics of one stage output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TensorStats {
    pub rows: usize,
    pub cols: usize,
    pub nan_count: usize,
    pub inf_count: usize,
    /// Largest finite absolute value
    pub max_abs: f32,
}

impl TensorStats {
    /// Scan a matrix.
    pub fn of(values: &Array2<f32>) -> Self {
        let mut stats = Self {
            rows: values.nrows(),
            cols: values.ncols(),
            nan_count: 0,
            inf_count: 0,
            max_abs: 0.0,
        };
        for &v in values.iter() {
            if v.is_nan() {
                stats.nan_count += 1;
            } else if v.is_infinite() {
                stats.inf_count += 1;
            } else {
                stats.max_abs = stats.max_abs.max(v.abs());
            }
        }
        stats
    }

    /// Whether every value is finite.
    pub fn is_finite(&self) -> bool {
        self.nan_count == 0 && self.inf_count == 0
    }
}

/// Receives each stage output of a forward pass, in pipeline order.
pub trait ForwardObserver {
    fn observe(&mut self, stage: ForwardStage, output: &Array2<f32>);
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ForwardObserver for NoopObserver {
    fn observe(&mut self, _stage: ForwardStage, _output: &Array2<f32>) {}
}

/// Health of one stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageHealth {
    pub stage: ForwardStage,
    pub stats: TensorStats,
}

/// Per-stage statistics collected over one forward pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthReport {
    /// When the report was started
    pub checked_at: Timestamp,
    /// Stage results in pipeline order
    pub stages: Vec<StageHealth>,
}

impl HealthReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self {
            checked_at: now(),
            stages: Vec::new(),
        }
    }

    /// Whether no stage produced NaN or infinite values.
    pub fn is_healthy(&self) -> bool {
        self.stages.iter().all(|s| s.stats.is_finite())
    }

    /// The earliest stage with non-finite output.
    pub fn first_unhealthy(&self) -> Option<&StageHealth> {
        self.stages.iter().find(|s| !s.stats.is_finite())
    }

    /// Statistics recorded for `stage`.
    pub fn stage(&self, stage: ForwardStage) -> Option<&TensorStats> {
        self.stages.iter().find(|s| s.stage == stage).map(|s| &s.stats)
    }

    /// Convert to an error naming the first unhealthy stage.
    pub fn into_result(self) -> Result<Self> {
        match self.first_unhealthy() {
            Some(bad) => Err(Error::NumericalInstability {
                stage: bad.stage.to_string(),
                nan_count: bad.stats.nan_count,
                inf_count: bad.stats.inf_count,
            }),
            None => Ok(self),
        }
    }

    /// Format as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for HealthReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwardObserver for HealthReport {
    fn observe(&mut self, stage: ForwardStage, output: &Array2<f32>) {
        let stats = TensorStats::of(output);
        if !stats.is_finite() {
            warn!(
                stage = %stage,
                nan = stats.nan_count,
                inf = stats.inf_count,
                "non-finite values in forward pass"
            );
        }
        self.stages.push(StageHealth { stage, stats });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_tensor_stats() {
        let stats = TensorStats::of(&array![[1.0f32, -3.0], [f32::NAN, f32::INFINITY]]);
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.cols, 2);
        assert_eq!(stats.nan_count, 1);
        assert_eq!(stats.inf_count, 1);
        assert_eq!(stats.max_abs, 3.0);
        assert!(!stats.is_finite());
    }

    #[test]
    fn test_report_tracks_first_unhealthy() {
        let mut report = HealthReport::new();
        report.observe(ForwardStage::RandomWalk, &array![[1.0f32]]);
        report.observe(ForwardStage::ResidualLayer(3), &array![[f32::NAN]]);
        report.observe(ForwardStage::Regressor, &array![[f32::NEG_INFINITY]]);

        assert!(!report.is_healthy());
        let bad = report.first_unhealthy().unwrap();
        assert_eq!(bad.stage, ForwardStage::ResidualLayer(3));
        assert_eq!(report.stage(ForwardStage::Regressor).unwrap().inf_count, 1);

        match report.into_result() {
            Err(Error::NumericalInstability { stage, nan_count, .. }) => {
                assert_eq!(stage, "residual_layer_3");
                assert_eq!(nan_count, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_healthy_report() {
        let mut report = HealthReport::default();
        report.observe(ForwardStage::Attention, &array![[0.5f32, 2.0]]);
        assert!(report.is_healthy());
        assert!(report.first_unhealthy().is_none());
        assert!(report.to_json().unwrap().contains("Attention"));
        assert!(report.into_result().is_ok());
    }
}
