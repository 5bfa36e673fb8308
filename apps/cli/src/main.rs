//! manualmerge CLI: unify two product-variant manifests of a service manual.
//!
//! Reads each variant's `manifest.json`, merges the hierarchies by normalized
//! title path, and writes one manifest tagged with per-variant availability.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
