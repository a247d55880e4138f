//! Weight Transformer
//!
//! Reshapes a layer's raw weight tensor into the memory layout the embedded
//! kernel indexes directly, and flattens it row-major over the target axes.
//!
//! - Convolution: (kernelH, kernelW, inC, outC) -> (outC, kernelH, kernelW, inC)
//! - Dense: (inC, outC) -> (outC, inC)
//!
//! Pure functions of their input; no side effects.

use crate::error::{QforgeError, Result};
use crate::model::{ChannelOrder, LayerDescriptor, LayerKind, Tensor};

/// A layer's weights in the kernel's canonical layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedLayer {
    pub name: String,
    pub kind: LayerKind,
    /// Row-major flattening over the `data_format` axes.
    pub flat_weights: Vec<f32>,
    /// One bias per output channel.
    pub bias: Vec<f32>,
    /// Target layout dimensions; `data_format[0]` is the output-channel count.
    pub data_format: Vec<usize>,
    pub kernel_size: Option<(usize, usize)>,
    pub strides: Option<(usize, usize)>,
}

impl TransformedLayer {
    pub fn output_channels(&self) -> usize {
        self.data_format[0]
    }
}

/// Transform one layer into the kernel's layout.
///
/// Returns `Ok(None)` for layers of kind `Other`, which carry no weights and
/// are skipped by downstream stages.
pub fn transform_layer(layer: &LayerDescriptor) -> Result<Option<TransformedLayer>> {
    layer.validate()?;

    if layer.kind == LayerKind::Other {
        return Ok(None);
    }

    if layer.channel_order == ChannelOrder::ChannelsFirst {
        return Err(QforgeError::UnsupportedLayout {
            layer: layer.name.clone(),
            reason: "channels-first tensors are not supported by the target kernel".to_string(),
        });
    }

    // validate() guarantees presence for weight-bearing kinds
    let weights = layer.weights.as_ref().unwrap();
    let bias = layer.bias.as_ref().unwrap();

    let transformed = match layer.kind {
        LayerKind::Convolution => transform_convolution(layer, weights, bias)?,
        LayerKind::Dense => transform_dense(layer, weights, bias)?,
        LayerKind::Other => unreachable!(),
    };

    debug_assert_eq!(
        transformed.flat_weights.len(),
        transformed.data_format.iter().product::<usize>()
    );
    Ok(Some(transformed))
}

/// (kernelH, kernelW, inC, outC) -> (outC, kernelH, kernelW, inC), row-major.
fn transform_convolution(
    layer: &LayerDescriptor,
    weights: &Tensor,
    bias: &Tensor,
) -> Result<TransformedLayer> {
    if weights.rank() != 4 {
        return Err(QforgeError::ShapeMismatch {
            layer: layer.name.clone(),
            tensor: "weights".to_string(),
            shape: weights.shape.clone(),
            expected_rank: 4,
        });
    }
    let (kernel_h, kernel_w, in_c, out_c) = (
        weights.shape[0],
        weights.shape[1],
        weights.shape[2],
        weights.shape[3],
    );
    check_bias_len(layer, bias, out_c)?;

    let mut flat = Vec::with_capacity(weights.len());
    for o in 0..out_c {
        for h in 0..kernel_h {
            for w in 0..kernel_w {
                for i in 0..in_c {
                    flat.push(weights.get(&[h, w, i, o]));
                }
            }
        }
    }

    Ok(TransformedLayer {
        name: layer.name.clone(),
        kind: layer.kind,
        flat_weights: flat,
        bias: bias.data.clone(),
        data_format: vec![out_c, kernel_h, kernel_w, in_c],
        kernel_size: layer.kernel_size,
        strides: layer.strides,
    })
}

/// (inC, outC) -> (outC, inC), row-major.
fn transform_dense(
    layer: &LayerDescriptor,
    weights: &Tensor,
    bias: &Tensor,
) -> Result<TransformedLayer> {
    if weights.rank() != 2 {
        return Err(QforgeError::ShapeMismatch {
            layer: layer.name.clone(),
            tensor: "weights".to_string(),
            shape: weights.shape.clone(),
            expected_rank: 2,
        });
    }
    let (in_c, out_c) = (weights.shape[0], weights.shape[1]);
    check_bias_len(layer, bias, out_c)?;

    let mut flat = Vec::with_capacity(weights.len());
    for o in 0..out_c {
        for i in 0..in_c {
            flat.push(weights.get(&[i, o]));
        }
    }

    Ok(TransformedLayer {
        name: layer.name.clone(),
        kind: layer.kind,
        flat_weights: flat,
        bias: bias.data.clone(),
        data_format: vec![out_c, in_c],
        kernel_size: None,
        strides: None,
    })
}

fn check_bias_len(layer: &LayerDescriptor, bias: &Tensor, out_c: usize) -> Result<()> {
    if bias.len() != out_c {
        return Err(QforgeError::InvalidModel {
            reason: format!(
                "layer '{}': bias length {} does not match {} output channels",
                layer.name,
                bias.len(),
                out_c
            ),
        });
    }
    Ok(())
}
