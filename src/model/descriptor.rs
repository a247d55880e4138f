//! Layer descriptors
//!
//! Normalized, read-only view of one external model layer. The adapter
//! guarantees the presence invariants at construction; downstream stages can
//! rely on them without re-checking.

use serde::{Deserialize, Serialize};

use crate::error::{QforgeError, Result};
use crate::model::tensor::Tensor;

/// Layer classification. An explicit tag supplied by the adapter, never
/// inferred from name substrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Convolution,
    Dense,
    /// Structural layer with no learned parameters (activation, flatten, ...)
    Other,
}

impl LayerKind {
    pub fn is_weight_bearing(self) -> bool {
        matches!(self, LayerKind::Convolution | LayerKind::Dense)
    }
}

/// Tensor axis convention of the source layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    /// NHWC; conv kernels arrive as (kernelH, kernelW, inC, outC), dense
    /// kernels as (inC, outC). The only supported convention.
    ChannelsLast,
    /// NCHW. Rejected rather than silently mis-transformed.
    ChannelsFirst,
}

/// Normalized view of one external model layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub name: String,
    pub kind: LayerKind,
    pub weights: Option<Tensor>,
    pub bias: Option<Tensor>,
    /// (kernelH, kernelW); convolution only.
    pub kernel_size: Option<(usize, usize)>,
    /// (strideY, strideX); convolution only.
    pub strides: Option<(usize, usize)>,
    pub channel_order: ChannelOrder,
}

impl LayerDescriptor {
    /// Validate the presence invariants:
    /// - `Other` layers never carry weights
    /// - bias is present exactly when weights are present
    /// - weight-bearing layers carry non-empty tensors
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            LayerKind::Other => {
                if self.weights.is_some() || self.bias.is_some() {
                    return Err(QforgeError::InvalidModel {
                        reason: format!(
                            "layer '{}' has kind 'other' but carries weight tensors",
                            self.name
                        ),
                    });
                }
            }
            LayerKind::Convolution | LayerKind::Dense => {
                let weights = self.weights.as_ref().ok_or_else(|| QforgeError::EmptyWeights {
                    layer: self.name.clone(),
                    tensor: "weights".to_string(),
                })?;
                let bias = self.bias.as_ref().ok_or_else(|| QforgeError::EmptyWeights {
                    layer: self.name.clone(),
                    tensor: "bias".to_string(),
                })?;
                if weights.is_empty() {
                    return Err(QforgeError::EmptyWeights {
                        layer: self.name.clone(),
                        tensor: "weights".to_string(),
                    });
                }
                if bias.is_empty() {
                    return Err(QforgeError::EmptyWeights {
                        layer: self.name.clone(),
                        tensor: "bias".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
