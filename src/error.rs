//! Error handling for Qforge
//!
//! Every conversion failure identifies the offending layer and parameter.
//! Nothing is silently recovered: an incorrect fixed-point constant would
//! corrupt inference on the target device with no runtime signal.

use thiserror::Error;

/// Result type alias for Qforge operations
pub type Result<T> = std::result::Result<T, QforgeError>;

/// Main error type for Qforge operations
#[derive(Error, Debug)]
pub enum QforgeError {
    // Model Input Errors
    #[error("Invalid model: {reason}")]
    InvalidModel { reason: String },

    #[error("Layer '{layer}': empty {tensor} tensor on a weight-bearing layer")]
    EmptyWeights { layer: String, tensor: String },

    // Layout Errors
    #[error("Layer '{layer}': unsupported layout: {reason}")]
    UnsupportedLayout { layer: String, reason: String },

    #[error("Layer '{layer}': {tensor} shape {shape:?} does not match expected rank {expected_rank}")]
    ShapeMismatch {
        layer: String,
        tensor: String,
        shape: Vec<usize>,
        expected_rank: usize,
    },

    #[error("Layer '{layer}': {tensor} contains a non-finite value ({value})")]
    NonFiniteValue {
        layer: String,
        tensor: String,
        value: f32,
    },

    // Quantization Errors
    #[error(
        "Layer '{layer}': {tensor} range exceeds Q-format capacity: \
         peak {peak} needs {int_bits} integer bits but only {weight_size} total bits are available"
    )]
    QuantizationRange {
        layer: String,
        tensor: String,
        peak: f32,
        int_bits: u32,
        weight_size: u32,
    },

    #[error(
        "Layer '{layer}': {tensor} value {value} quantizes to {quantized}, \
         outside the signed {weight_size}-bit range"
    )]
    QuantizationOverflow {
        layer: String,
        tensor: String,
        value: f32,
        quantized: i64,
        weight_size: u32,
    },

    // Emission Errors
    #[error("Duplicate layer name '{name}' (case-insensitive collision with '{existing}')")]
    DuplicateLayerName { name: String, existing: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QforgeError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            QforgeError::InvalidModel { .. } => "INVALID_MODEL",
            QforgeError::EmptyWeights { .. } => "EMPTY_WEIGHTS",
            QforgeError::UnsupportedLayout { .. } => "UNSUPPORTED_LAYOUT",
            QforgeError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            QforgeError::NonFiniteValue { .. } => "NON_FINITE_VALUE",
            QforgeError::QuantizationRange { .. } => "QUANTIZATION_RANGE",
            QforgeError::QuantizationOverflow { .. } => "QUANTIZATION_OVERFLOW",
            QforgeError::DuplicateLayerName { .. } => "DUPLICATE_LAYER_NAME",
            QforgeError::InvalidConfig { .. } => "INVALID_CONFIG",
            QforgeError::Io(_) => "IO_ERROR",
            QforgeError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            QforgeError::InvalidModel { .. } => vec![
                "Re-export the model dump from the training framework",
                "Check the JSON structure against the expected layer schema",
            ],
            QforgeError::UnsupportedLayout { .. } => vec![
                "Re-train or re-export the model with channels-last data format",
                "The embedded kernel only accepts channels-last (NHWC) tensors",
            ],
            QforgeError::QuantizationRange { .. } | QforgeError::QuantizationOverflow { .. } => {
                vec![
                    "Increase weight_size to 16 bits",
                    "Normalize or regularize the layer's weights during training",
                ]
            }
            QforgeError::DuplicateLayerName { .. } => vec![
                "Rename the colliding layers in the training framework",
                "Emitted constant names are case-insensitive and must be unique",
            ],
            QforgeError::NonFiniteValue { .. } => vec![
                "The exported tensor contains NaN or infinity",
                "Check the training run for divergence and re-export the model",
            ],
            QforgeError::EmptyWeights { .. } => vec![
                "The exporter produced a weight-bearing layer with no tensor data",
                "Re-export the model and verify the layer has been trained",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = QforgeError::QuantizationRange {
            layer: "conv2d_1".to_string(),
            tensor: "weights".to_string(),
            peak: 200.0,
            int_bits: 8,
            weight_size: 8,
        };
        assert_eq!(err.error_code(), "QUANTIZATION_RANGE");
    }

    #[test]
    fn test_error_names_offending_layer() {
        let err = QforgeError::UnsupportedLayout {
            layer: "conv2d_1".to_string(),
            reason: "channels-first weights".to_string(),
        };
        assert!(err.to_string().contains("conv2d_1"));
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = QforgeError::DuplicateLayerName {
            name: "Dense_1".to_string(),
            existing: "dense_1".to_string(),
        };
        assert!(!err.recovery_suggestions().is_empty());
    }
}
