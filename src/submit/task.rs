// src/submit/task.rs
//! Submission task type
//!
//! The unit of work handed from a connection's read loop to the worker
//! pool. A task is built once on the I/O path, moved through the queue, and
//! consumed by exactly one worker; nothing in it is shared mutably.

use crate::server::MinerConn;
use crate::submit::reject::RejectReason;
use std::sync::Arc;
use std::time::Instant;

/// One queued `mining.submit` request
///
/// Carries the owning connection, the raw request bytes (owned, immutable
/// after construction), and the facts the read loop already established so
/// workers do not repeat them.
pub struct SubmissionTask {
    /// Connection the request arrived on; shared, not owned
    pub conn: Arc<MinerConn>,
    /// Complete raw request line, without the trailing newline
    pub raw_line: Vec<u8>,
    /// When the read loop received the line
    pub received_at: Instant,
    /// True when an optimistic acknowledgement was already written; the
    /// processor must not send any further response on the happy path
    pub optimistic: bool,
    /// Rejection decided on the I/O path (e.g. unauthorized), before full
    /// validation ran
    pub policy_reject: Option<RejectReason>,
}

impl SubmissionTask {
    /// Builds a task, stamping the arrival time.
    pub fn new(
        conn: Arc<MinerConn>,
        raw_line: Vec<u8>,
        optimistic: bool,
        policy_reject: Option<RejectReason>,
    ) -> Self {
        SubmissionTask {
            conn,
            raw_line,
            received_at: Instant::now(),
            optimistic,
            policy_reject,
        }
    }
}
