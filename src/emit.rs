//! Header Emitter
//!
//! Serializes the quantized layer sequence as C-preprocessor constant
//! definitions, one block per layer, in network order. Output is assembled
//! in memory and returned as a single string: identical input produces
//! byte-identical text, and nothing is emitted if any layer fails.

use std::collections::HashMap;
use std::fmt::Write;

use log::debug;

use crate::error::{QforgeError, Result};
use crate::model::LayerKind;
use crate::quant::QuantizedLayer;

/// Fixed leading comment. No timestamp: the output must be byte-identical
/// across runs.
const HEADER_PREAMBLE: &str = "/* Generated by qforge. Fixed-point network constants, schema v1. */\n";

/// Emit the full header for an ordered layer sequence.
///
/// Layer blocks appear in exactly the input order. Duplicate emitted names
/// (case-insensitive) fail before any text is produced.
pub fn emit_header(layers: &[QuantizedLayer]) -> Result<String> {
    check_unique_names(layers)?;

    let mut out = String::new();
    out.push_str(HEADER_PREAMBLE);

    for layer in layers {
        out.push('\n');
        emit_layer(&mut out, layer)?;
        debug!("emitted constants for layer '{}'", layer.name);
    }

    Ok(out)
}

fn check_unique_names(layers: &[QuantizedLayer]) -> Result<()> {
    let mut seen: HashMap<String, String> = HashMap::new();
    for layer in layers {
        let key = sanitize_name(&layer.name);
        if let Some(existing) = seen.insert(key, layer.name.clone()) {
            return Err(QforgeError::DuplicateLayerName {
                name: layer.name.clone(),
                existing,
            });
        }
    }
    Ok(())
}

/// Uppercase the layer name and map anything outside [A-Z0-9] to '_' so the
/// result is a valid C macro prefix.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_alphanumeric() {
                upper
            } else {
                '_'
            }
        })
        .collect()
}

fn emit_layer(out: &mut String, layer: &QuantizedLayer) -> Result<()> {
    let prefix = sanitize_name(&layer.name);

    write_int_list(out, &prefix, "WEIGHTS", &layer.weight_ints);
    write_int_list(out, &prefix, "BIAS", &layer.bias_ints);
    writeln!(out, "#define {}_BIAS_SHIFT {}", prefix, layer.bias_shift).unwrap();
    writeln!(out, "#define {}_OUTPUT_SHIFT {}", prefix, layer.output_shift).unwrap();

    if layer.kind == LayerKind::Convolution {
        emit_convolution_geometry(out, &prefix, layer)?;
    }
    Ok(())
}

/// Convolution geometry constants, derived from the target data format
/// (outC, kernelH, kernelW, inC) and the layer's hyperparameters.
fn emit_convolution_geometry(
    out: &mut String,
    prefix: &str,
    layer: &QuantizedLayer,
) -> Result<()> {
    let out_c = layer.data_format[0];
    let in_c = layer.data_format[3];
    let (kernel_h, kernel_w) = layer.kernel_size.ok_or_else(|| QforgeError::InvalidModel {
        reason: format!("convolution layer '{}' is missing kernel_size", layer.name),
    })?;
    let (stride_y, stride_x) = layer.strides.ok_or_else(|| QforgeError::InvalidModel {
        reason: format!("convolution layer '{}' is missing strides", layer.name),
    })?;
    // The kernel takes a single stride constant
    if stride_y != stride_x {
        return Err(QforgeError::UnsupportedLayout {
            layer: layer.name.clone(),
            reason: format!(
                "asymmetric strides ({}, {}) are not supported by the target kernel",
                stride_y, stride_x
            ),
        });
    }

    writeln!(out, "#define {}_INPUT_CHANNELS {}", prefix, in_c).unwrap();
    writeln!(out, "#define {}_OUTPUT_CHANNELS {}", prefix, out_c).unwrap();
    writeln!(out, "#define {}_KERNEL_X {}", prefix, kernel_w).unwrap();
    writeln!(out, "#define {}_KERNEL_Y {}", prefix, kernel_h).unwrap();
    writeln!(out, "#define {}_STRIDES {}", prefix, stride_x).unwrap();
    Ok(())
}

fn write_int_list(out: &mut String, prefix: &str, param: &str, values: &[i32]) {
    write!(out, "#define {}_{} {{", prefix, param).unwrap();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write!(out, "{}", v).unwrap();
    }
    out.push_str("}\n");
}
