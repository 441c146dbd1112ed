// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing::info;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Collect {
            config,
            output,
            split_dev,
        }) => {
            info!("Collecting projects from {}", config.display());
            commands::cmd_collect(&config, output.as_deref(), split_dev)
        }
        Some(Commands::Check {
            directory,
            no_lockfile,
            dev,
            ignore_dev,
        }) => {
            info!("Checking {}", directory.display());
            commands::cmd_check(directory, no_lockfile, dev, ignore_dev)
        }
        None => {
            // No command provided, show help
            println!("packaudit v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'packaudit --help' for usage information");
            Ok(())
        }
    }
}
