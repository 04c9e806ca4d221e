// src/state/mod.rs
//! Durable pool state
//!
//! A small embedded SQLite database under `<data_dir>/state/` holding the
//! append-only found-blocks log. Earlier releases wrote the log to a flat
//! `found_blocks.jsonl` file at the same location; the destructive clear
//! operation still removes that file when present so maintenance leaves no
//! stale records behind.

/// SQLite-backed found-blocks store
pub mod db;

// Re-export main components for cleaner imports
pub use db::{StateStore, clear_found_blocks, state_db_path};
