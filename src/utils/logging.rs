// src/utils/logging.rs
//! Logging configuration and utilities
//!
//! This module handles logging setup for the pool server. Rejected shares
//! and silently dropped optimistic submissions are logged at debug level to
//! keep the hot path quiet under normal operation; found blocks and relay
//! failures are logged at info/error level.
//!
//! Uses `env_logger` under the hood with custom formatting and filtering.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;

/// Initializes the logging subsystem with sensible defaults
///
/// # Configuration
/// - Logs to stdout
/// - Default log level: Info (override with `RUST_LOG`)
/// - Custom format: timestamp (seconds since epoch), level, module, line
pub fn init_logging() {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            use std::io::Write;
            let ts = buf.timestamp_seconds();
            let level = record.level();
            let module = record.module_path().unwrap_or_default();
            let line = record.line().unwrap_or(0);

            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                ts,
                level,
                module,
                line,
                record.args()
            )
        })
        .target(Target::Stdout);

    if env::var("RUST_LOG").is_err() {
        builder.filter_level(LevelFilter::Info);
    } else {
        builder.parse_env("RUST_LOG");
    }

    builder.init();
}
