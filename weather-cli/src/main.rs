//! Binary crate for the `cep-weather` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Running the edge or the weather HTTP service
//! - Interactive configuration and one-shot lookups

use clap::Parser;

mod cli;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    cmd.run().await
}
