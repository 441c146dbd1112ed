// src/cli.rs
//! CLI definitions for packaudit
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "packaudit")]
#[command(author = "Packaudit Contributors")]
#[command(version)]
#[command(about = "Inventory and classify installed npm dependencies", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect every configured project into one inventory
    Collect {
        /// Path to the audit configuration
        #[arg(short, long, default_value = packaudit::config::DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Write the inventory here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report production and development packages separately
        #[arg(long)]
        split_dev: bool,
    },

    /// Audit a single project directory with default settings
    Check {
        /// Project root (the directory holding node_modules)
        directory: PathBuf,

        /// Skip lock file reconciliation
        #[arg(long)]
        no_lockfile: bool,

        /// Without a lock file, treat every package as a dev dependency
        #[arg(long, requires = "no_lockfile")]
        dev: bool,

        /// Drop packages only reachable through dev dependencies
        #[arg(long)]
        ignore_dev: bool,
    },
}
