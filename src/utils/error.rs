// src/utils/error.rs
use crate::submit::task::SubmissionTask;
use std::io;
use thiserror::Error;

/// Main error type for the pool server
///
/// This enum represents all fallible plumbing in the server: I/O, JSON
/// handling, node RPC transport, the embedded state database, and
/// configuration loading. Share rejections are deliberately *not* errors;
/// they are expected, frequent outcomes modelled by
/// [`crate::submit::RejectReason`].
#[derive(Error, Debug)]
pub enum PoolError {
    /// Errors in protocol handling or invalid protocol messages
    #[error("Protocol violation: {0}")]
    ProtocolError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP transport errors talking to the node RPC endpoint
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Node RPC answered but reported a failure (e.g. rejected block)
    #[error("Node RPC error: {0}")]
    RpcError(String),

    /// Embedded state database errors
    #[error("State DB error: {0}")]
    DbError(#[from] rusqlite::Error),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Thread communication channel errors
    #[error("Thread communication error: {0}")]
    ChannelError(String),

    /// Invalid input data (bad hex, wrong field widths, out-of-range values)
    #[error("Invalid input: {0}")]
    InputError(String),
}

/// Converts crossbeam channel send errors for submission tasks into PoolError
///
/// Sending only fails when every worker has exited, which means the process
/// is shutting down; the task carried inside the error is dropped.
impl From<crossbeam_channel::SendError<SubmissionTask>> for PoolError {
    fn from(e: crossbeam_channel::SendError<SubmissionTask>) -> Self {
        PoolError::ChannelError(format!("Submission task send failed: {}", e))
    }
}

/// Converts hex decoding errors into PoolError
///
/// Used when invalid hex data is encountered during:
/// - Template field decoding (previous hash, difficulty bits)
/// - Configuration parsing (payout script)
/// Wraps the original error in an `InputError` variant.
impl From<hex::FromHexError> for PoolError {
    fn from(e: hex::FromHexError) -> Self {
        PoolError::InputError(format!("Hex conversion failed: {}", e))
    }
}
