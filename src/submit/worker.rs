// src/submit/worker.rs
//! Submission worker pool
//!
//! A fixed set of background threads drains a bounded task queue shared by
//! every connection. The queue capacity scales with worker throughput and
//! enqueueing blocks when it is full: a flooding client stalls its own read
//! loop instead of growing server memory, which throttles it without an
//! explicit rate limiter.
//!
//! The pool is constructed once at server startup and handed to every
//! connection handler as a shared handle; it lives for the process lifetime
//! and has no teardown path.

use crate::submit::processor;
use crate::submit::task::SubmissionTask;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// How much queue backlog is allowed per worker thread.
pub const QUEUE_MULTIPLIER: usize = 32;

/// Minimum queue capacity regardless of worker count, so single-core
/// deployments still have headroom.
pub const QUEUE_MIN_DEPTH: usize = 128;

/// Fixed-size pool of submission workers behind a bounded queue
///
/// Accepts tasks from many concurrent producers and guarantees each is
/// processed by exactly one worker. A failure inside one task is contained
/// to that task; the worker resumes with the next one.
pub struct SubmissionWorkerPool {
    tasks: Sender<SubmissionTask>,
}

impl SubmissionWorkerPool {
    /// Creates the pool and spawns its worker threads.
    ///
    /// The worker count is clamped to at least 1 and the queue is sized by
    /// [`queue_depth`]. Returns a shared handle; clone the `Arc` into every
    /// connection handler.
    pub fn new(worker_count: usize) -> Arc<Self> {
        let worker_count = normalize_worker_count(worker_count);
        let (tx, rx) = bounded(queue_depth(worker_count));
        for id in 0..worker_count {
            let rx: Receiver<SubmissionTask> = rx.clone();
            thread::spawn(move || worker_loop(id, rx));
        }
        log::info!("submission worker pool started with {} workers", worker_count);
        Arc::new(SubmissionWorkerPool { tasks: tx })
    }

    /// Default worker count: the runtime's available parallelism rather than
    /// the raw hardware thread count, clamped to at least 1.
    pub fn default_worker_count() -> usize {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or_else(|_| num_cpus::get())
            .max(1)
    }

    /// Enqueues a task, blocking the caller while the queue is full.
    ///
    /// Blocking here is the backpressure mechanism: the producing read loop
    /// stalls rather than the server buffering without bound. A send error
    /// only occurs if every worker has exited, which does not happen in a
    /// running server; the task is dropped and the error logged.
    pub fn submit(&self, task: SubmissionTask) {
        if let Err(e) = self.tasks.send(task) {
            log::error!("submission queue closed, dropping task: {}", e);
        }
    }
}

/// Pulls tasks forever, isolating each one's failure.
fn worker_loop(id: usize, rx: Receiver<SubmissionTask>) {
    for task in rx.iter() {
        run_isolated(id, task);
    }
}

/// Executes one task inside a fault boundary.
///
/// A panic inside processing must never take down the worker or starve
/// other miners: the payload is logged and the loop continues.
fn run_isolated(id: usize, task: SubmissionTask) {
    let conn_id = task.conn.id.clone();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        processor::process_submission_task(task);
    }));
    if let Err(payload) = result {
        log::error!(
            "submission worker {} panicked processing task from conn {}: {}",
            id,
            conn_id,
            panic_message(&payload)
        );
    }
}

/// Best-effort extraction of a panic payload message.
fn panic_message(payload: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Clamps a configured worker count to at least one worker.
pub fn normalize_worker_count(worker_count: usize) -> usize {
    if worker_count == 0 { 1 } else { worker_count }
}

/// Queue capacity for a worker count: backlog scales with throughput but
/// never drops below the floor.
pub fn queue_depth(worker_count: usize) -> usize {
    (worker_count * QUEUE_MULTIPLIER).max(QUEUE_MIN_DEPTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::MinerConn;
    use crate::server::conn::testutil::CaptureSink;
    use crate::submit::reject::RejectReason;
    use std::io::{self, Write};
    use std::time::{Duration, Instant};

    /// Write sink that fails by panicking, not by returning an error.
    struct PanicSink;

    impl Write for PanicSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            panic!("sink failure");
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn reject_task(conn: &Arc<MinerConn>) -> SubmissionTask {
        SubmissionTask::new(
            Arc::clone(conn),
            br#"{"id":1,"method":"mining.submit","params":["w","j","00000000","6553f100","00000001"]}"#
                .to_vec(),
            false,
            Some(RejectReason::Unauthorized),
        )
    }

    /// A task that panics mid-processing must not take its worker down:
    /// on a single-worker pool the next task still gets its response.
    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = SubmissionWorkerPool::new(1);

        // Writing the rejection response panics inside the worker.
        let bad_conn = Arc::new(MinerConn::new("bad", Box::new(PanicSink)));
        pool.submit(reject_task(&bad_conn));

        let sink = CaptureSink::default();
        let good_conn = Arc::new(MinerConn::new("good", Box::new(sink.clone())));
        pool.submit(reject_task(&good_conn));

        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.contents().is_empty() {
            assert!(Instant::now() < deadline, "second task never processed");
            thread::sleep(Duration::from_millis(10));
        }
        let written = String::from_utf8(sink.contents()).unwrap();
        assert!(written.contains("Unauthorized"), "{}", written);
    }

    /// Zero means "pick for me" and becomes one worker; explicit counts are
    /// kept as-is.
    #[test]
    fn test_normalize_worker_count() {
        assert_eq!(normalize_worker_count(0), 1);
        assert_eq!(normalize_worker_count(1), 1);
        assert_eq!(normalize_worker_count(8), 8);
    }

    /// One worker gets the floor depth; ten workers scale past it.
    #[test]
    fn test_queue_depth() {
        assert_eq!(queue_depth(1), QUEUE_MIN_DEPTH);
        assert_eq!(queue_depth(4), QUEUE_MIN_DEPTH);
        assert_eq!(queue_depth(10), 10 * QUEUE_MULTIPLIER);
    }

    /// The default is never zero, whatever the host reports.
    #[test]
    fn test_default_worker_count_positive() {
        assert!(SubmissionWorkerPool::default_worker_count() >= 1);
    }
}
