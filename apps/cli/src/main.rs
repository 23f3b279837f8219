//! rfpscope CLI: check a company profile against an RFP with an LLM.
//!
//! Reads the extracted text of both documents, runs the compliance,
//! eligibility, risk and submission tasks, and prints the merged JSON.

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
