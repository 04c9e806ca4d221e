//! BTC Pool - Bitcoin mining pool share-submission engine in Rust
//!
//! This crate provides the hot path of a Stratum v1 mining pool:
//! - Fast-path recognition and optimistic acknowledgement of `mining.submit`
//! - A bounded worker pool validating shares off the connection I/O path
//! - Full proof-of-work scoring against share and network targets
//! - Block assembly and relay to a full node over JSON-RPC
//! - A durable found-blocks log

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Stratum wire protocol: fast-path scanning and message types
pub mod protocol;

/// Share submission engine: queue, workers, and validation
pub mod submit;

/// Job management and target arithmetic
pub mod jobs;

/// Consensus serialization: coinbase, merkle, header, block
pub mod chain;

/// Network communication with the full node
pub mod network;

/// Durable pool state (found-blocks database)
pub mod state;

/// Stratum server frontend and per-connection state
pub mod server;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use jobs::{BlockTemplate, Job, JobRegistry};
pub use network::{BlockSubmitter, NodeClient};
pub use protocol::fast_mining_submit_id;
pub use server::{MinerConn, Server};
pub use state::StateStore;
pub use submit::{RejectReason, SubmissionTask, SubmissionWorkerPool};
pub use utils::{PoolError, init_logging};
