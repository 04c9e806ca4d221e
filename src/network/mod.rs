// src/network/mod.rs
//! Network communication components
//!
//! This module handles the pool's outbound interaction with a full node.
//! Inbound miner traffic is owned by [`crate::server`]; what lives here is
//! the JSON-RPC client used to relay winning blocks, behind the
//! [`BlockSubmitter`] trait so processing code never depends on a live node.

/// Node RPC client implementation
///
/// Handles communication with the full node over JSON-RPC, including the
/// timed `submitblock` relay used for winning shares.
pub mod node;

// Re-export main components for cleaner imports
pub use node::{BlockSubmitter, NodeClient, NodeConfig};
