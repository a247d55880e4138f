//! CLI Module
//!
//! Command-line interface for the Qforge weight converter.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Qforge - fixed-point weight converter for embedded inference kernels
#[derive(Parser, Debug)]
#[command(name = "qforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a model dump into a fixed-point constants header
    #[command(name = "convert")]
    Convert {
        /// Path to the exported model dump (JSON)
        model: PathBuf,

        /// Output header path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Bits per quantized weight (8 or 16)
        #[arg(long, default_value_t = 8)]
        weight_size: u32,

        /// Fraction bits of the network's input tensor
        #[arg(long, default_value_t = 8)]
        image_frac_bits: u32,

        /// Reuse the fixed input fraction-bit count for every layer instead
        /// of chaining shifts layer to layer
        #[arg(long)]
        legacy_shifts: bool,
    },

    /// Print each layer's Q-format and shifts without emitting a header
    #[command(name = "inspect")]
    Inspect {
        /// Path to the exported model dump (JSON)
        model: PathBuf,

        /// Bits per quantized weight (8 or 16)
        #[arg(long, default_value_t = 8)]
        weight_size: u32,

        /// Fraction bits of the network's input tensor
        #[arg(long, default_value_t = 8)]
        image_frac_bits: u32,

        /// Use the legacy fixed-constant shift policy
        #[arg(long)]
        legacy_shifts: bool,
    },
}
