// src/chain/mod.rs
//! Block assembly primitives
//!
//! Everything needed to turn a validated submission back into consensus
//! bytes: coinbase construction from the job's template parameters and the
//! two nonce segments, the merkle fold up to the root, 80-byte header
//! assembly, and full-block serialization for `submitblock`.

/// Coinbase, merkle, header, and block serialization
pub mod block;

// Re-export main components for cleaner imports
pub use block::{
    VERSION_ROLLING_MASK, build_coinbase, build_header, merkle_root, rolled_version,
    serialize_block, sha256d,
};
