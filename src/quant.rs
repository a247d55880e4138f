//! Quantizer
//!
//! Chooses a fixed-point Q-format per tensor, rounds floats into that format,
//! and derives the inter-layer arithmetic shifts the kernel applies during
//! fixed-point accumulation.
//!
//! Rounding is round-half-to-nearest with ties away from zero (`f64::round`),
//! matching the reference converter.

use num_traits::ToPrimitive;

use crate::config::{ConvertConfig, ShiftMode, WeightSize};
use crate::error::{QforgeError, Result};
use crate::model::LayerKind;
use crate::transform::TransformedLayer;

/// A tensor's chosen fixed-point split: `weight_size = 1 (sign) + int + frac`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QFormat {
    pub int_bits: u32,
    pub frac_bits: u32,
}

/// A layer's weights and bias as Q-format integers plus the shifts the
/// kernel needs. Created once per layer, never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedLayer {
    pub name: String,
    pub kind: LayerKind,
    pub weight_ints: Vec<i32>,
    pub bias_ints: Vec<i32>,
    pub weight_frac_bits: u32,
    pub bias_frac_bits: u32,
    /// Right shift aligning the independently-quantized bias with the
    /// weight*activation accumulator scale.
    pub bias_shift: i32,
    /// Right shift removing the weight scale from the accumulator so the
    /// result carries the next layer's input scale.
    pub output_shift: i32,
    pub data_format: Vec<usize>,
    pub kernel_size: Option<(usize, usize)>,
    pub strides: Option<(usize, usize)>,
}

/// Reject NaN and infinity before any range arithmetic. `f32::max` discards
/// a NaN operand, so a non-finite element would otherwise vanish from the
/// peak fold and round to a silent 0 in the header.
fn check_finite(values: &[f32], layer: &str, tensor: &str) -> Result<()> {
    for &v in values {
        if !v.is_finite() {
            return Err(QforgeError::NonFiniteValue {
                layer: layer.to_string(),
                tensor: tensor.to_string(),
                value: v,
            });
        }
    }
    Ok(())
}

/// Choose the Q-format for one tensor from its own value range.
///
/// `int_bits` is the minimum integer-bit count holding the tensor's peak
/// magnitude (`ceil(log2(peak))`, floored at 0; 0 for an all-zero tensor).
/// The remaining bits after the sign bit become fraction bits; if the peak
/// needs more integer bits than the word provides, that is a range error,
/// never a silent clamp. Non-finite elements are rejected up front.
pub fn select_format(
    values: &[f32],
    weight_size: WeightSize,
    layer: &str,
    tensor: &str,
) -> Result<QFormat> {
    check_finite(values, layer, tensor)?;
    let peak = values.iter().fold(0.0f32, |acc, &v| acc.max(v.abs()));

    let int_bits = if peak == 0.0 {
        0
    } else {
        let bits = (peak as f64).log2().ceil();
        if bits > 0.0 {
            // peak below weight_size bits of magnitude, cast is exact
            bits.to_u32().unwrap_or(u32::MAX)
        } else {
            0
        }
    };

    let frac_bits = weight_size.bits() as i64 - int_bits as i64 - 1;
    if frac_bits < 0 {
        return Err(QforgeError::QuantizationRange {
            layer: layer.to_string(),
            tensor: tensor.to_string(),
            peak,
            int_bits,
            weight_size: weight_size.bits(),
        });
    }

    Ok(QFormat {
        int_bits,
        frac_bits: frac_bits as u32,
    })
}

/// Round one float into a Q-format integer, checking the signed word range.
pub fn quantize_value(
    value: f32,
    frac_bits: u32,
    weight_size: WeightSize,
    layer: &str,
    tensor: &str,
) -> Result<i32> {
    if !value.is_finite() {
        return Err(QforgeError::NonFiniteValue {
            layer: layer.to_string(),
            tensor: tensor.to_string(),
            value,
        });
    }
    let scaled = (value as f64 * (1u64 << frac_bits) as f64).round();
    let quantized = scaled as i64;
    if quantized < weight_size.min_value() || quantized > weight_size.max_value() {
        return Err(QforgeError::QuantizationOverflow {
            layer: layer.to_string(),
            tensor: tensor.to_string(),
            value,
            quantized,
            weight_size: weight_size.bits(),
        });
    }
    Ok(quantized as i32)
}

fn quantize_all(
    values: &[f32],
    frac_bits: u32,
    weight_size: WeightSize,
    layer: &str,
    tensor: &str,
) -> Result<Vec<i32>> {
    values
        .iter()
        .map(|&v| quantize_value(v, frac_bits, weight_size, layer, tensor))
        .collect()
}

/// Whole-network quantizer.
///
/// Tracks the running input fraction-bit count across layers: a layer's
/// accumulator carries `input_frac + weight_frac` fraction bits, and after
/// the output shift the remainder becomes the next layer's input scale.
/// `ShiftMode::Legacy` instead reuses the configured `image_frac_bits` for
/// every layer, as the original converter did.
#[derive(Debug)]
pub struct NetworkQuantizer {
    config: ConvertConfig,
    input_frac_bits: i32,
}

impl NetworkQuantizer {
    pub fn new(config: &ConvertConfig) -> Self {
        Self {
            config: config.clone(),
            input_frac_bits: config.image_frac_bits as i32,
        }
    }

    /// Fraction-bit count the next quantized layer's input will carry.
    pub fn input_frac_bits(&self) -> i32 {
        self.input_frac_bits
    }

    /// Quantize one transformed layer and advance the running input scale.
    pub fn quantize_layer(&mut self, layer: &TransformedLayer) -> Result<QuantizedLayer> {
        let weight_size = self.config.weight_size;
        let weight_format = select_format(&layer.flat_weights, weight_size, &layer.name, "weights")?;
        // Bias Q-format comes from the bias tensor's own range, never the
        // weight tensor's.
        let bias_format = select_format(&layer.bias, weight_size, &layer.name, "bias")?;

        let weight_ints = quantize_all(
            &layer.flat_weights,
            weight_format.frac_bits,
            weight_size,
            &layer.name,
            "weights",
        )?;
        let bias_ints = quantize_all(
            &layer.bias,
            bias_format.frac_bits,
            weight_size,
            &layer.name,
            "bias",
        )?;

        let input_frac = match self.config.shift_mode {
            ShiftMode::Chained => self.input_frac_bits,
            ShiftMode::Legacy => self.config.image_frac_bits as i32,
        };
        let bias_shift = input_frac + weight_format.frac_bits as i32 - bias_format.frac_bits as i32;
        let output_shift = weight_format.frac_bits as i32;

        if self.config.shift_mode == ShiftMode::Chained {
            // Accumulator scale minus the output shift is what the next
            // layer sees on its input.
            self.input_frac_bits = input_frac + weight_format.frac_bits as i32 - output_shift;
        }

        Ok(QuantizedLayer {
            name: layer.name.clone(),
            kind: layer.kind,
            weight_ints,
            bias_ints,
            weight_frac_bits: weight_format.frac_bits,
            bias_frac_bits: bias_format.frac_bits,
            bias_shift,
            output_shift,
            data_format: layer.data_format.clone(),
            kernel_size: layer.kernel_size,
            strides: layer.strides,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    fn dense_transformed(name: &str, weights: Vec<f32>, bias: Vec<f32>) -> TransformedLayer {
        let out_c = bias.len();
        let in_c = weights.len() / out_c;
        TransformedLayer {
            name: name.to_string(),
            kind: LayerKind::Dense,
            flat_weights: weights,
            bias,
            data_format: vec![out_c, in_c],
            kernel_size: None,
            strides: None,
        }
    }

    #[test_case(&[0.5], 0; "half needs no integer bits")]
    #[test_case(&[1.0], 0; "one is the q7 boundary")]
    #[test_case(&[1.5], 1; "between one and two")]
    #[test_case(&[3.9], 2; "just under four")]
    #[test_case(&[4.0], 2; "exactly four")]
    #[test_case(&[100.0], 7; "large but representable in q15")]
    #[test_case(&[0.0], 0; "all zero degenerates to zero")]
    #[test_case(&[0.01], 0; "tiny values never go negative")]
    fn test_int_bits(values: &[f32], expected: u32) {
        let format = select_format(values, WeightSize::Bits16, "layer", "weights").unwrap();
        assert_eq!(format.int_bits, expected);
        assert_eq!(format.frac_bits, 16 - expected - 1);
    }

    #[test]
    fn test_sample_scenario_dense_1() {
        let mut quantizer = NetworkQuantizer::new(&ConvertConfig::default());
        let layer = dense_transformed("dense_1", vec![0.5, 0.125, -0.25, 0.0], vec![0.1, -0.2]);
        let q = quantizer.quantize_layer(&layer).unwrap();

        assert_eq!(q.weight_frac_bits, 7);
        assert_eq!(q.weight_ints, vec![64, 16, -32, 0]);
        // bias peak 0.2 -> int_bits 0 -> frac 7
        assert_eq!(q.bias_frac_bits, 7);
        assert_eq!(q.bias_ints, vec![13, -26]);
        assert_eq!(q.bias_shift, 8 + 7 - 7);
        assert_eq!(q.output_shift, 7);
    }

    #[test]
    fn test_overflow_scenario_peak_200() {
        let err = select_format(&[200.0], WeightSize::Bits8, "conv2d_1", "weights").unwrap_err();
        assert_eq!(err.error_code(), "QUANTIZATION_RANGE");
        // int_bits 8 leaves frac_bits at -1 in an 8-bit word
        match err {
            QforgeError::QuantizationRange { int_bits, .. } => assert_eq!(int_bits, 8),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_boundary_value_overflows_after_rounding() {
        // peak 1.0 selects Q0.7 whose maximum is 127/128; round(1.0 * 128)
        // lands outside the signed word and must error, not clamp
        let format = select_format(&[1.0], WeightSize::Bits8, "dense_1", "weights").unwrap();
        assert_eq!(format.frac_bits, 7);
        let err = quantize_value(1.0, 7, WeightSize::Bits8, "dense_1", "weights").unwrap_err();
        assert_eq!(err.error_code(), "QUANTIZATION_OVERFLOW");
    }

    #[test]
    fn test_all_zero_tensor_degenerates_cleanly() {
        let mut quantizer = NetworkQuantizer::new(&ConvertConfig::default());
        let layer = dense_transformed("dense_z", vec![0.0, 0.0, 0.0, 0.0], vec![0.0, 0.0]);
        let q = quantizer.quantize_layer(&layer).unwrap();
        assert_eq!(q.weight_frac_bits, 7);
        assert!(q.weight_ints.iter().all(|&v| v == 0));
        assert!(q.bias_ints.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_rounding_ties_away_from_zero() {
        // 0.51171875 * 128 = 65.5 rounds to 66; -65.5 rounds to -66
        assert_eq!(
            quantize_value(65.5 / 128.0, 7, WeightSize::Bits8, "l", "w").unwrap(),
            66
        );
        assert_eq!(
            quantize_value(-65.5 / 128.0, 7, WeightSize::Bits8, "l", "w").unwrap(),
            -66
        );
    }

    #[test]
    fn test_round_trip_error_bound() {
        let values = [0.7071, -0.3333, 0.0123, -0.9921, 0.5, 0.015625];
        let format = select_format(&values, WeightSize::Bits8, "l", "w").unwrap();
        let half_step = 0.5 / (1u64 << format.frac_bits) as f32;
        for &v in &values {
            let q = quantize_value(v, format.frac_bits, WeightSize::Bits8, "l", "w").unwrap();
            let recovered = q as f32 / (1u64 << format.frac_bits) as f32;
            assert_abs_diff_eq!(recovered, v, epsilon = half_step + f32::EPSILON);
        }
    }

    #[test]
    fn test_bias_format_uses_bias_range() {
        // Weights stay below 1.0 while the bias reaches 3.0; each tensor must
        // get its own format
        let mut quantizer = NetworkQuantizer::new(&ConvertConfig::default());
        let layer = dense_transformed("dense_b", vec![0.5, -0.5], vec![3.0, -3.0]);
        let q = quantizer.quantize_layer(&layer).unwrap();
        assert_eq!(q.weight_frac_bits, 7);
        assert_eq!(q.bias_frac_bits, 8 - 2 - 1);
        assert_eq!(q.bias_ints, vec![96, -96]);
        assert_eq!(q.bias_shift, 8 + 7 - 5);
    }

    #[test]
    fn test_chained_tracker_follows_output_shift() {
        let config = ConvertConfig::default();
        let mut quantizer = NetworkQuantizer::new(&config);
        assert_eq!(quantizer.input_frac_bits(), 8);

        let layer = dense_transformed("dense_1", vec![0.5, 0.125, -0.25, 0.0], vec![0.1, -0.2]);
        let q = quantizer.quantize_layer(&layer).unwrap();
        // With output_shift equal to weight_frac_bits the running input scale
        // is unchanged; the tracker must still derive it rather than assume it
        assert_eq!(
            quantizer.input_frac_bits(),
            8 + q.weight_frac_bits as i32 - q.output_shift
        );
        assert_eq!(quantizer.input_frac_bits(), 8);
    }

    #[test]
    fn test_legacy_and_chained_agree_for_reference_shifts() {
        let layers = vec![
            dense_transformed("dense_1", vec![0.5, 0.125, -0.25, 0.0], vec![0.1, -0.2]),
            dense_transformed("dense_2", vec![1.5, -1.25, 0.75, 0.5], vec![2.0, -1.0]),
        ];

        let chained_cfg =
            ConvertConfig::new(WeightSize::Bits8, 8, ShiftMode::Chained).unwrap();
        let legacy_cfg = ConvertConfig::new(WeightSize::Bits8, 8, ShiftMode::Legacy).unwrap();
        let mut chained = NetworkQuantizer::new(&chained_cfg);
        let mut legacy = NetworkQuantizer::new(&legacy_cfg);

        for layer in &layers {
            let a = chained.quantize_layer(layer).unwrap();
            let b = legacy.quantize_layer(layer).unwrap();
            assert_eq!(a.bias_shift, b.bias_shift);
            assert_eq!(a.output_shift, b.output_shift);
        }
    }

    #[test]
    fn test_nan_weight_rejected_not_zeroed() {
        // A NaN used to vanish from the peak fold and round to an emitted 0
        let mut quantizer = NetworkQuantizer::new(&ConvertConfig::default());
        let layer = dense_transformed("dense_1", vec![0.5, f32::NAN], vec![0.1]);
        let err = quantizer.quantize_layer(&layer).unwrap_err();
        assert_eq!(err.error_code(), "NON_FINITE_VALUE");
        assert!(err.to_string().contains("dense_1"));
        assert!(err.to_string().contains("weights"));
    }

    #[test]
    fn test_nan_bias_rejected() {
        let mut quantizer = NetworkQuantizer::new(&ConvertConfig::default());
        let layer = dense_transformed("dense_1", vec![0.5, 0.25], vec![f32::NAN, 0.1]);
        let err = quantizer.quantize_layer(&layer).unwrap_err();
        assert_eq!(err.error_code(), "NON_FINITE_VALUE");
        assert!(err.to_string().contains("bias"));
    }

    #[test]
    fn test_infinite_peak_reported_as_non_finite() {
        // Previously surfaced as a range error claiming u32::MAX integer bits
        let err = select_format(&[f32::INFINITY], WeightSize::Bits8, "conv2d_1", "weights")
            .unwrap_err();
        assert_eq!(err.error_code(), "NON_FINITE_VALUE");
    }

    #[test]
    fn test_quantize_value_rejects_non_finite() {
        let err = quantize_value(f32::NAN, 7, WeightSize::Bits8, "l", "w").unwrap_err();
        assert_eq!(err.error_code(), "NON_FINITE_VALUE");
        let err = quantize_value(f32::NEG_INFINITY, 7, WeightSize::Bits8, "l", "w").unwrap_err();
        assert_eq!(err.error_code(), "NON_FINITE_VALUE");
    }

    #[test]
    fn test_16_bit_word() {
        let format = select_format(&[0.5], WeightSize::Bits16, "l", "w").unwrap();
        assert_eq!(format.frac_bits, 15);
        assert_eq!(
            quantize_value(0.5, 15, WeightSize::Bits16, "l", "w").unwrap(),
            16384
        );
    }
}
