// src/cli/commands.rs
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bitcoin mining pool server - Stratum share submission engine
#[derive(Parser, Debug)]
#[command(name = "btc-pool-rs")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (run the server, generate config, or maintain state)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the pool application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Start the pool server with specified options
    Start(StartOptions),

    /// Generate configuration file template
    Config(ConfigOptions),

    /// Clear the found-blocks log from the state database
    ClearBlocks(ClearBlocksOptions),
}

/// Options for starting the pool server
#[derive(Parser, Debug)]
pub struct StartOptions {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Number of submission worker threads (overrides config)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Stratum listen address (overrides config)
    #[arg(short, long)]
    pub listen: Option<String>,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,

    /// Include the node RPC configuration template
    #[arg(short, long)]
    pub node: bool,
}

/// Options for clearing the found-blocks log
#[derive(Parser, Debug)]
pub struct ClearBlocksOptions {
    /// Data directory holding the state database
    #[arg(short, long, default_value = "./data")]
    pub data_dir: PathBuf,
}
