//! Conversion configuration
//!
//! Process-wide constants fixed before a conversion run and never mutated
//! during one: quantized word width, the input tensor's fraction-bit count,
//! and the shift-chaining policy.

use serde::{Deserialize, Serialize};

use crate::error::{QforgeError, Result};

/// Bit width of each quantized weight and bias value.
///
/// Serializes as the plain bit count (`8` or `16`) so config files spell the
/// width as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSize {
    /// q7-style 8-bit words (1 sign bit + 7 value bits)
    Bits8,
    /// q15-style 16-bit words (1 sign bit + 15 value bits)
    Bits16,
}

impl Serialize for WeightSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for WeightSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        WeightSize::from_bits(bits).map_err(serde::de::Error::custom)
    }
}

impl WeightSize {
    /// Total bits per quantized value, including the sign bit.
    pub fn bits(self) -> u32 {
        match self {
            WeightSize::Bits8 => 8,
            WeightSize::Bits16 => 16,
        }
    }

    /// Largest representable quantized value.
    pub fn max_value(self) -> i64 {
        (1i64 << (self.bits() - 1)) - 1
    }

    /// Smallest representable quantized value.
    pub fn min_value(self) -> i64 {
        -(1i64 << (self.bits() - 1))
    }

    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(WeightSize::Bits8),
            16 => Ok(WeightSize::Bits16),
            other => Err(QforgeError::InvalidConfig {
                reason: format!("weight_size must be 8 or 16 bits, got {}", other),
            }),
        }
    }
}

/// How the input fraction-bit count is chosen for layers past the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftMode {
    /// Track the running fraction-bit count layer to layer: layer N+1's input
    /// scale is layer N's accumulator scale after its output shift.
    #[default]
    Chained,
    /// Reuse the fixed `image_frac_bits` constant for every layer, matching
    /// the legacy converter's behavior.
    Legacy,
}

/// Upper bound on the input fraction-bit count. Activations accumulate in
/// 32-bit registers on the target; anything past this is a misconfiguration.
const MAX_IMAGE_FRAC_BITS: u32 = 31;

/// Configuration for a conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Bits per quantized weight/bias word.
    pub weight_size: WeightSize,
    /// Fraction-bit count of the network's input tensor, fixed by the input
    /// normalization scheme (8 when inputs are pre-scaled to [0,1) as UQ.8).
    pub image_frac_bits: u32,
    /// Inter-layer shift-chaining policy.
    #[serde(default)]
    pub shift_mode: ShiftMode,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            weight_size: WeightSize::Bits8,
            image_frac_bits: 8,
            shift_mode: ShiftMode::Chained,
        }
    }
}

impl ConvertConfig {
    pub fn new(weight_size: WeightSize, image_frac_bits: u32, shift_mode: ShiftMode) -> Result<Self> {
        let config = Self {
            weight_size,
            image_frac_bits,
            shift_mode,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.image_frac_bits > MAX_IMAGE_FRAC_BITS {
            return Err(QforgeError::InvalidConfig {
                reason: format!(
                    "image_frac_bits {} exceeds the 32-bit accumulator ({} max)",
                    self.image_frac_bits, MAX_IMAGE_FRAC_BITS
                ),
            });
        }
        Ok(())
    }
}
