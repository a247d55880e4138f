//! Conversion pipeline
//!
//! Runs the staged transform over an ordered layer sequence: adapter output
//! -> weight transform -> quantization -> header emission. The whole run is
//! all-or-nothing: the header text exists only after every layer converted.

use log::info;

use crate::config::ConvertConfig;
use crate::emit;
use crate::error::Result;
use crate::model::LayerDescriptor;
use crate::quant::{NetworkQuantizer, QuantizedLayer};
use crate::transform;

/// Quantize every weight-bearing layer, in network order.
///
/// Layers of kind `Other` contribute nothing to the result; their positions
/// in the sequence are irrelevant to fixed-point scaling because they carry
/// no learned parameters.
pub fn quantize_model(
    layers: &[LayerDescriptor],
    config: &ConvertConfig,
) -> Result<Vec<QuantizedLayer>> {
    config.validate()?;

    let mut quantizer = NetworkQuantizer::new(config);
    let mut quantized = Vec::new();

    for layer in layers {
        match transform::transform_layer(layer)? {
            Some(transformed) => {
                let q = quantizer.quantize_layer(&transformed)?;
                info!(
                    "layer '{}': weights Q.{}, bias Q.{}, bias_shift {}, output_shift {}",
                    q.name, q.weight_frac_bits, q.bias_frac_bits, q.bias_shift, q.output_shift
                );
                quantized.push(q);
            }
            None => {
                info!("layer '{}': no weights, skipped", layer.name);
            }
        }
    }

    Ok(quantized)
}

/// Convert a full model into header text.
pub fn convert_model(layers: &[LayerDescriptor], config: &ConvertConfig) -> Result<String> {
    let quantized = quantize_model(layers, config)?;
    let header = emit::emit_header(&quantized)?;
    info!(
        "emitted {} layer blocks ({} bytes)",
        quantized.len(),
        header.len()
    );
    Ok(header)
}
