// src/utils/mod.rs
//! Utilities module for common functionality
//!
//! This module contains shared utilities used throughout the pool server,
//! including error handling and logging infrastructure.

/// Error types and handling utilities
///
/// Contains the [`PoolError`] enum which defines all possible error conditions
/// for the pool server, along with conversion implementations.
pub mod error;

/// Logging configuration and utilities
///
/// Provides logging initialization and configuration for the application,
/// including formatting and output destinations.
pub mod logging;

// Re-export for easier access
pub use error::PoolError;
pub use logging::init_logging;
