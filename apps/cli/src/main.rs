//! sdgtool CLI: stage commands for SDG project-listing data.
//!
//! Normalizes CSV listings, cross-references cover images, geocodes
//! street addresses, and converts the result to JSON.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
