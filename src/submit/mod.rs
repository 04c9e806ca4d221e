// src/submit/mod.rs
//! Share submission engine
//!
//! The hot path of the pool: `mining.submit` requests come off connection
//! read loops as raw bytes, cross a bounded queue into a fixed worker pool,
//! and run through a validation state machine that scores the proof of work
//! and relays winning blocks. Everything else the server does exists to
//! feed this path.

/// Rejection taxonomy with stable codes and messages
pub mod reject;

/// The queued unit of work handed from read loops to workers
pub mod task;

/// Fixed worker pool behind a bounded, backpressuring queue
pub mod worker;

/// The per-submission validation and relay state machine
pub mod processor;

// Re-export main components for cleaner imports
pub use reject::RejectReason;
pub use task::SubmissionTask;
pub use worker::SubmissionWorkerPool;
