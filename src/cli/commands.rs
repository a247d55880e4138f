//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::io::Write;
use std::path::Path;

use log::info;

use crate::config::{ConvertConfig, ShiftMode, WeightSize};
use crate::error::Result;
use crate::model::load_model;
use crate::pipeline;

/// Build a run configuration from CLI flags.
pub fn build_config(weight_size: u32, image_frac_bits: u32, legacy_shifts: bool) -> Result<ConvertConfig> {
    let shift_mode = if legacy_shifts {
        ShiftMode::Legacy
    } else {
        ShiftMode::Chained
    };
    ConvertConfig::new(WeightSize::from_bits(weight_size)?, image_frac_bits, shift_mode)
}

/// Convert a model dump and write the header to a file or stdout.
///
/// The header is assembled fully in memory first; a failing layer leaves the
/// output path untouched.
pub fn convert(model_path: &Path, output: Option<&Path>, config: &ConvertConfig) -> Result<()> {
    info!("converting model: {}", model_path.display());

    let layers = load_model(model_path)?;
    let header = pipeline::convert_model(&layers, config)?;

    match output {
        Some(path) => {
            fs::write(path, &header)?;
            println!("Header written: {}", path.display());
        }
        None => {
            std::io::stdout().write_all(header.as_bytes())?;
        }
    }

    Ok(())
}

/// Print each weight-bearing layer's chosen Q-format and shifts.
pub fn inspect(model_path: &Path, config: &ConvertConfig) -> Result<()> {
    info!("inspecting model: {}", model_path.display());

    let layers = load_model(model_path)?;
    let quantized = pipeline::quantize_model(&layers, config)?;

    if quantized.is_empty() {
        println!("No weight-bearing layers.");
        return Ok(());
    }

    println!(
        "{:<20} {:<12} {:>8} {:>8} {:>11} {:>13}",
        "layer", "kind", "w_frac", "b_frac", "bias_shift", "output_shift"
    );
    println!("{:-<76}", "");
    for layer in &quantized {
        println!(
            "{:<20} {:<12} {:>8} {:>8} {:>11} {:>13}",
            layer.name,
            format!("{:?}", layer.kind),
            layer.weight_frac_bits,
            layer.bias_frac_bits,
            layer.bias_shift,
            layer.output_shift
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelDump, Tensor};
    use crate::model::adapter::LayerDump;

    fn write_sample_model(dir: &Path) -> std::path::PathBuf {
        let dump = ModelDump {
            name: "sample".to_string(),
            layers: vec![LayerDump {
                name: "dense_1".to_string(),
                class_name: "Dense".to_string(),
                data_format: "channels_last".to_string(),
                weights: Some(Tensor::new(vec![2, 2], vec![0.5, -0.25, 0.125, 0.0]).unwrap()),
                bias: Some(Tensor::new(vec![2], vec![0.1, -0.2]).unwrap()),
                kernel_size: None,
                strides: None,
            }],
        };
        let path = dir.join("model.json");
        fs::write(&path, serde_json::to_string(&dump).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_build_config_flags() {
        let config = build_config(16, 15, true).unwrap();
        assert_eq!(config.weight_size, WeightSize::Bits16);
        assert_eq!(config.image_frac_bits, 15);
        assert_eq!(config.shift_mode, ShiftMode::Legacy);

        assert!(build_config(12, 8, false).is_err());
    }

    #[test]
    fn test_convert_writes_header_file() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = write_sample_model(dir.path());
        let out_path = dir.path().join("weights.h");

        convert(&model_path, Some(&out_path), &ConvertConfig::default()).unwrap();

        let header = fs::read_to_string(&out_path).unwrap();
        assert!(header.contains("#define DENSE_1_WEIGHTS {64,16,-32,0}"));
    }

    #[test]
    fn test_failed_convert_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let dump = ModelDump {
            name: "bad".to_string(),
            layers: vec![LayerDump {
                name: "dense_1".to_string(),
                class_name: "Dense".to_string(),
                data_format: "channels_last".to_string(),
                weights: Some(Tensor::new(vec![1, 1], vec![200.0]).unwrap()),
                bias: Some(Tensor::new(vec![1], vec![0.0]).unwrap()),
                kernel_size: None,
                strides: None,
            }],
        };
        let model_path = dir.path().join("model.json");
        fs::write(&model_path, serde_json::to_string(&dump).unwrap()).unwrap();
        let out_path = dir.path().join("weights.h");

        assert!(convert(&model_path, Some(&out_path), &ConvertConfig::default()).is_err());
        assert!(!out_path.exists());
    }

    #[test]
    fn test_inspect_runs() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = write_sample_model(dir.path());
        inspect(&model_path, &ConvertConfig::default()).unwrap();
    }
}
