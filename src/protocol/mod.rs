// src/protocol/mod.rs
//! Stratum v1 protocol surface
//!
//! This module owns everything that touches raw request bytes:
//! - `fastpath`: the zero-copy `mining.submit` id extractor used by the
//!   connection read loop for optimistic acknowledgements
//! - `messages`: serde envelope/parameter types and response rendering

/// Zero-copy fast path for `mining.submit` requests
///
/// Extracts the JSON-RPC id token without building a parse tree. Falls back
/// to a negative result on anything unusual; the caller then decodes fully.
pub mod fastpath;

/// Wire message types and response rendering
///
/// Contains the request envelope, positional submit parameters, and the
/// success/rejection response encoders.
pub mod messages;

// Re-export main components for cleaner imports
pub use fastpath::fast_mining_submit_id;
pub use messages::{StratumRequest, SubmitParams};
