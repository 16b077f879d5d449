//! omr-answers CLI
//!
//! Infers the answers of a scanned answer sheet from a document-analysis JSON result.
//!
//! # Usage
//!
//! ```bash
//! omr-answers infer --input sheet.ocr.json
//! omr-answers infer --input sheet.ocr.json --config sheet.config.json --key CAADABABDA... --output json
//! omr-answers default-config > sheet.config.json
//! ```

mod cli;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "omr-answers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Answer inference for scanned multiple-choice answer sheets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer the answers of one sheet
    Infer {
        /// Document-analysis result (JSON)
        #[arg(long, short)]
        input: PathBuf,

        /// Inference configuration (JSON); defaults apply when omitted
        #[arg(long, env = "OMR_CONFIG")]
        config: Option<PathBuf>,

        /// Answer key of 40 letters; commas and whitespace are ignored
        #[arg(long)]
        key: Option<String>,

        /// Output format (pretty, json)
        #[arg(long, default_value = "pretty", value_parser = ["pretty", "json"])]
        output: String,
    },
    /// Print the default configuration as JSON
    DefaultConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    omr_answers::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Infer {
            input,
            config,
            key,
            output,
        } => {
            let run = config::RunConfig {
                input,
                config_path: config,
                key,
                output,
            };
            info!("Processing file: {}", run.input.display());
            cli::process_file(&run)?;
        }
        Commands::DefaultConfig => {
            cli::print_default_config()?;
        }
    }

    Ok(())
}
