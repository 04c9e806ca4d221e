// src/config/mod.rs
//! Configuration management for the pool server
//!
//! This module handles all configuration-related functionality including:
//! - Loading and parsing configuration files
//! - Generating configuration templates
//! - Defaulting tunables that are usually left alone
//!
//! The configuration uses TOML format. The node RPC section is optional so
//! the server can run without a relay target in test setups.

/// Core configuration implementation
///
/// Contains the [`Config`] struct that defines the server's configuration
/// structure and defaults.
pub mod config;

// Re-export key items for easy access
pub use config::Config;

use crate::utils::error::PoolError;
use std::path::PathBuf;

/// Loads pool configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the configuration file (anything convertible to PathBuf)
///
/// # Returns
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(PoolError)` - If the file couldn't be read or parsed
pub fn load(path: impl Into<PathBuf>) -> Result<Config, PoolError> {
    Config::load(path)
}

/// Generates a commented configuration template
///
/// # Arguments
/// * `node` - Whether to include the node RPC section
///
/// # Returns
/// String containing a ready-to-use TOML configuration template
pub fn generate_template(node: bool) -> String {
    Config::generate_template(node)
}
