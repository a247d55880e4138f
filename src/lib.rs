//! Qforge - Fixed-Point Weight Converter
//!
//! Qforge converts a trained neural network's per-layer float32 weights into
//! fixed-point (Q-format) compile-time constants consumable by an embedded
//! inference kernel library (CMSIS-NN style).
//!
//! # Architecture
//!
//! The pipeline is three staged value types connected by pure functions:
//! - `LayerDescriptor`: normalized view of an external model layer
//! - `TransformedLayer`: weights reshaped into the kernel's memory layout
//! - `QuantizedLayer`: Q-format integers plus derived arithmetic shifts
//!
//! The header emitter serializes the quantized sequence as deterministic
//! `#define` text in network order. Either every layer converts and the full
//! header is emitted, or the run fails before any output is written.

pub mod cli;
pub mod config;
pub mod emit;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod quant;
pub mod transform;

pub use error::{QforgeError, Result};
