use anyhow::Result;
use clap::Parser;

use dopack::cli::{Cli, Commands};
use dopack::commands;
use dopack::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    logging::init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Build(args) => commands::build::run(&args).await,
        Commands::Clean(args) => commands::clean::run(&args),
        Commands::Components(args) => commands::components::run(&args),
    }
}
