//! Layer Adapter
//!
//! Parses the training framework's serialized model dump (an ordered JSON
//! layer list produced by the exporter) into normalized [`LayerDescriptor`]s.
//! Layer kinds come from the exporter's class names through an explicit
//! mapping table; the adapter also guarantees case-insensitive name
//! uniqueness across the sequence.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{QforgeError, Result};
use crate::model::descriptor::{ChannelOrder, LayerDescriptor, LayerKind};
use crate::model::tensor::Tensor;

/// One layer as written by the exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDump {
    pub name: String,
    pub class_name: String,
    #[serde(default = "default_data_format")]
    pub data_format: String,
    #[serde(default)]
    pub weights: Option<Tensor>,
    #[serde(default)]
    pub bias: Option<Tensor>,
    #[serde(default)]
    pub kernel_size: Option<(usize, usize)>,
    #[serde(default)]
    pub strides: Option<(usize, usize)>,
}

fn default_data_format() -> String {
    "channels_last".to_string()
}

/// The exporter's whole-model dump: a name plus layers in evaluation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDump {
    pub name: String,
    pub layers: Vec<LayerDump>,
}

/// Map an exporter class name to a layer kind. Exact names, not substrings.
fn classify(class_name: &str) -> Result<LayerKind> {
    match class_name {
        "Conv2D" => Ok(LayerKind::Convolution),
        "Dense" => Ok(LayerKind::Dense),
        "Activation" | "Flatten" | "Dropout" | "InputLayer" | "MaxPooling2D"
        | "AveragePooling2D" => Ok(LayerKind::Other),
        other => Err(QforgeError::InvalidModel {
            reason: format!("unrecognized layer class '{}'", other),
        }),
    }
}

fn parse_channel_order(layer: &LayerDump) -> Result<ChannelOrder> {
    match layer.data_format.as_str() {
        "channels_last" => Ok(ChannelOrder::ChannelsLast),
        "channels_first" => Ok(ChannelOrder::ChannelsFirst),
        other => Err(QforgeError::InvalidModel {
            reason: format!(
                "layer '{}' has unknown data_format '{}'",
                layer.name, other
            ),
        }),
    }
}

/// Normalize a parsed dump into validated layer descriptors, preserving order.
pub fn parse_model(dump: &ModelDump) -> Result<Vec<LayerDescriptor>> {
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut descriptors = Vec::with_capacity(dump.layers.len());

    for layer in &dump.layers {
        if let Some(existing) = seen.insert(layer.name.to_uppercase(), layer.name.clone()) {
            return Err(QforgeError::DuplicateLayerName {
                name: layer.name.clone(),
                existing,
            });
        }

        let kind = classify(&layer.class_name)?;
        let descriptor = LayerDescriptor {
            name: layer.name.clone(),
            kind,
            weights: layer.weights.clone(),
            bias: layer.bias.clone(),
            kernel_size: layer.kernel_size,
            strides: layer.strides,
            channel_order: parse_channel_order(layer)?,
        };
        descriptor.validate()?;

        debug!(
            "adapted layer '{}' ({}) as {:?}",
            descriptor.name, layer.class_name, descriptor.kind
        );
        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

/// Load a model dump from a JSON file and normalize it.
pub fn load_model(path: &Path) -> Result<Vec<LayerDescriptor>> {
    let text = fs::read_to_string(path)?;
    let dump: ModelDump = serde_json::from_str(&text)?;
    parse_model(&dump)
}
