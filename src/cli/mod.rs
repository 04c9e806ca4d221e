// src/cli/mod.rs
//! Command-line interface definitions

/// Subcommand and option structures
pub mod commands;

pub use commands::{Action, ClearBlocksOptions, Commands, ConfigOptions, StartOptions};
