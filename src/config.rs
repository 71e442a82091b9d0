//! Configuration for graph construction and the network.
//!
//! Every section deserializes with defaults, so a partial JSON document is
//! enough to override a single field.

use crate::core::{Error, ImageSize, Result};
use crate::monitoring::logging::LoggerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Graph construction settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Minimum similarity for an edge (exclusive)
    pub threshold: f32,
    /// Reference frame for distance normalization
    pub image_size: ImageSize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            threshold: 0.936,
            image_size: ImageSize::default(),
        }
    }
}

impl GraphConfig {
    /// Reject thresholds and frames that make similarity meaningless.
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if self.image_size.width == 0 || self.image_size.height == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "image size must be non-empty, got {}",
                self.image_size
            )));
        }
        Ok(())
    }
}

/// What the adaptive initial residual adds at each layer after the first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialResidual {
    /// Add the anchor, then rebind the anchor to the layer's post-residual output.
    #[default]
    Rebinding,
    /// Always add the stack input.
    FixedAnchor,
}

/// How the developmental residual treats the first layer, which has no predecessor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstLayerDevelopmental {
    /// No developmental term at layer 0.
    #[default]
    Skip,
    /// Use the last layer as layer 0's predecessor.
    WrapToLast,
}

/// Residual wiring of the deep graph-convolution stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidualPolicy {
    pub initial: InitialResidual,
    pub first_layer: FirstLayerDevelopmental,
}

/// Network hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Depth of the residual graph-convolution stack
    pub num_layers: usize,
    /// Number of attention heads, must divide `hidden_channels`
    pub num_heads: usize,
    /// Node feature width entering the network
    pub in_channels: usize,
    /// Width after attention and through the residual stack
    pub hidden_channels: usize,
    /// Regression output width
    pub out_channels: usize,
    /// Random-walk propagation steps
    pub num_steps: usize,
    /// LeakyReLU slope used in attention scores
    pub negative_slope: f32,
    /// Residual wiring
    pub residual: ResidualPolicy,
    /// Seed for parameter initialization
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_layers: 12,
            num_heads: 8,
            in_channels: 16,
            hidden_channels: 32,
            out_channels: 10,
            num_steps: 5,
            negative_slope: 0.2,
            residual: ResidualPolicy::default(),
            seed: None,
        }
    }
}

impl ModelConfig {
    /// Width of each attention head.
    pub fn head_dim(&self) -> usize {
        if self.num_heads == 0 {
            0
        } else {
            self.hidden_channels / self.num_heads
        }
    }

    /// Check widths, depth and head divisibility.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("num_layers", self.num_layers),
            ("num_heads", self.num_heads),
            ("in_channels", self.in_channels),
            ("hidden_channels", self.hidden_channels),
            ("out_channels", self.out_channels),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfiguration(format!(
                    "{} must be positive",
                    name
                )));
            }
        }
        if self.hidden_channels % self.num_heads != 0 {
            return Err(Error::InvalidConfiguration(format!(
                "hidden_channels ({}) is not divisible by num_heads ({})",
                self.hidden_channels, self.num_heads
            )));
        }
        if !self.negative_slope.is_finite() {
            return Err(Error::InvalidConfiguration(
                "negative_slope must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LraGnnConfig {
    pub graph: GraphConfig,
    pub model: ModelConfig,
    pub logging: LoggerConfig,
}

impl LraGnnConfig {
    /// Parse from a JSON document and validate.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LraGnnConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file and validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.graph.validate()?;
        self.model.validate()
    }
}
