//! prospectclean CLI — LLM-backed prospect table cleaning.
//!
//! Validates and corrects name and company fields of a prospect CSV by
//! delegating ambiguous values to an external reasoning service.

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
