//! SSI Replace CLI: development-time fragment injection for built sites.
//!
//! Loads a build output directory, replaces the SSI include markers in
//! `index.html` with remotely hosted header, footer and sidebar fragments,
//! and writes the document back in place.

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
