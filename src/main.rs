//! Qforge CLI - Fixed-Point Weight Converter
//!
//! Command-line interface for converting trained model dumps into
//! fixed-point constant headers for embedded inference kernels.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use qforge::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    info!("Qforge v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Qforge v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Convert {
            model,
            output,
            weight_size,
            image_frac_bits,
            legacy_shifts,
        } => {
            let config = commands::build_config(weight_size, image_frac_bits, legacy_shifts)?;
            commands::convert(&model, output.as_deref(), &config)
                .with_context(|| format!("converting {}", model.display()))
        }
        Commands::Inspect {
            model,
            weight_size,
            image_frac_bits,
            legacy_shifts,
        } => {
            let config = commands::build_config(weight_size, image_frac_bits, legacy_shifts)?;
            commands::inspect(&model, &config)
                .with_context(|| format!("inspecting {}", model.display()))
        }
    }
}
