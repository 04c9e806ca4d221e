// src/server/conn.rs
//! Per-miner connection state
//!
//! A [`MinerConn`] is shared between the connection's read loop and the
//! submission workers, so everything mutable sits behind synchronization:
//! the buffered writer (responses may be written from any worker), the
//! active-job set, and the per-connection counters. The write sink is a
//! boxed `Write` so tests can capture output byte-for-byte.

use crate::jobs::{Job, target};
use crate::network::BlockSubmitter;
use crate::protocol::messages;
use crate::state::StateStore;
use crate::submit::reject::RejectReason;
use num_bigint::BigUint;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Per-connection counters
#[derive(Debug, Clone, Default)]
pub struct ConnStats {
    /// Worker name presented at authorization
    pub worker: String,
    /// Shares accepted against the share target
    pub accepted: u64,
    /// Shares rejected for any reason
    pub rejected: u64,
    /// Winning blocks found on this connection
    pub blocks_found: u64,
}

/// One miner connection
///
/// Owned by the read loop, shared with workers through an `Arc`. The
/// connection does not own its jobs; it holds references into the published
/// job set, pruned as templates retire.
pub struct MinerConn {
    /// Connection identifier used in logs
    pub id: String,
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    authorized: AtomicBool,
    extranonce1: Vec<u8>,
    share_target: BigUint,
    active_jobs: Mutex<HashMap<String, Arc<Job>>>,
    stale_jobs: Mutex<HashSet<String>>,
    rpc: Option<Arc<dyn BlockSubmitter>>,
    store: Option<Arc<StateStore>>,
    stats: Mutex<ConnStats>,
}

impl MinerConn {
    /// Creates a connection over a byte sink.
    ///
    /// Starts unauthorized, with an empty extranonce1 and a difficulty-1
    /// share target; use the `with_*` builders to wire the rest.
    pub fn new(id: impl Into<String>, writer: Box<dyn Write + Send>) -> Self {
        MinerConn {
            id: id.into(),
            writer: Mutex::new(BufWriter::new(writer)),
            authorized: AtomicBool::new(false),
            extranonce1: Vec::new(),
            share_target: target::diff1_target(),
            active_jobs: Mutex::new(HashMap::new()),
            stale_jobs: Mutex::new(HashSet::new()),
            rpc: None,
            store: None,
            stats: Mutex::new(ConnStats::default()),
        }
    }

    /// Sets the server-assigned extranonce1 segment.
    pub fn with_extranonce1(mut self, extranonce1: Vec<u8>) -> Self {
        self.extranonce1 = extranonce1;
        self
    }

    /// Sets the per-connection share target.
    pub fn with_share_target(mut self, target: BigUint) -> Self {
        self.share_target = target;
        self
    }

    /// Wires the node RPC collaborator used to relay winning blocks.
    pub fn with_rpc(mut self, rpc: Arc<dyn BlockSubmitter>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    /// Wires the durable found-blocks store.
    pub fn with_store(mut self, store: Arc<StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Marks the connection authorized for the given worker name.
    pub fn authorize(&self, worker: &str) {
        self.authorized.store(true, Ordering::Release);
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .worker = worker.to_string();
    }

    /// True once the connection may submit shares.
    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::Acquire)
    }

    /// Server-assigned extranonce1 for this connection.
    pub fn extranonce1(&self) -> &[u8] {
        &self.extranonce1
    }

    /// Share target submissions are scored against.
    pub fn share_target(&self) -> &BigUint {
        &self.share_target
    }

    /// Node RPC collaborator, if wired.
    pub fn rpc(&self) -> Option<&Arc<dyn BlockSubmitter>> {
        self.rpc.as_ref()
    }

    /// Durable found-blocks store, if wired.
    pub fn store(&self) -> Option<&Arc<StateStore>> {
        self.store.as_ref()
    }

    /// Adds a job to the connection's active set.
    pub fn add_job(&self, job: Arc<Job>) {
        self.active_jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.job_id.clone(), job);
    }

    /// Retires active jobs below the given height, remembering their ids so
    /// late submissions against them classify as stale rather than unknown.
    pub fn retire_jobs_below(&self, height: u64) {
        let mut jobs = self
            .active_jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let retired: Vec<String> = jobs
            .iter()
            .filter(|(_, job)| job.template.height < height)
            .map(|(id, _)| id.clone())
            .collect();
        if retired.is_empty() {
            return;
        }
        for id in &retired {
            jobs.remove(id);
        }
        let mut stale = self
            .stale_jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One height step obsoletes earlier markers too.
        stale.clear();
        stale.extend(retired);
    }

    /// Resolves a submitted job id against the active set.
    pub(crate) fn lookup_job(&self, job_id: &str) -> Result<Arc<Job>, RejectReason> {
        if let Some(job) = self
            .active_jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
        {
            return Ok(Arc::clone(job));
        }
        if self
            .stale_jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(job_id)
        {
            return Err(RejectReason::StaleJob);
        }
        Err(RejectReason::JobNotFound)
    }

    /// Writes one complete response line and flushes it.
    ///
    /// Flushing per line keeps acknowledgement latency bounded; the buffer
    /// only coalesces the line's own fragments.
    pub fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Sends the optimistic success acknowledgement, echoing a raw id token.
    pub fn send_raw_ack(&self, id_raw: &[u8]) -> io::Result<()> {
        self.write_line(&messages::raw_success_response(id_raw))
    }

    /// Sends a success response for a fully decoded request id.
    pub(crate) fn send_success(&self, id: &Value) -> io::Result<()> {
        self.write_line(messages::success_response(id).as_bytes())
    }

    /// Sends a rejection response for a fully decoded request id.
    pub(crate) fn send_error(&self, id: &Value, reason: RejectReason) -> io::Result<()> {
        self.write_line(messages::error_response(id, reason).as_bytes())
    }

    /// Counts an accepted share (and optionally a found block).
    pub(crate) fn record_accept(&self, is_block: bool) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.accepted += 1;
        if is_block {
            stats.blocks_found += 1;
        }
    }

    /// Counts a rejected share.
    pub(crate) fn record_reject(&self) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rejected += 1;
    }

    /// Snapshot of the connection counters.
    pub fn stats(&self) -> ConnStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Shared capture buffer usable as a connection write sink.
    #[derive(Clone, Default)]
    pub struct CaptureSink(pub Arc<Mutex<Vec<u8>>>);

    impl CaptureSink {
        pub fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for CaptureSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::CaptureSink;
    use super::*;
    use crate::jobs::BlockTemplate;

    fn capture_conn() -> (Arc<MinerConn>, CaptureSink) {
        let sink = CaptureSink::default();
        let conn = Arc::new(MinerConn::new("test", Box::new(sink.clone())));
        (conn, sink)
    }

    fn job_at_height(id: &str, height: u64) -> Arc<Job> {
        let template = BlockTemplate {
            height,
            version: 0x2000_0000,
            prev_hash: "0000000000000000000000000000000000000000000000000000000000000000"
                .to_string(),
            cur_time: 1_700_000_000,
            bits: "1d00ffff".to_string(),
            coinbase_value: 0,
            ..Default::default()
        };
        Arc::new(Job::new(id, template, 4, vec![0x51], "test").unwrap())
    }

    /// Lines are written atomically with a trailing newline and flushed
    /// through the buffer immediately.
    #[test]
    fn test_write_line_flushes() {
        let (conn, sink) = capture_conn();
        conn.write_line(b"{\"ok\":true}").unwrap();
        assert_eq!(sink.contents(), b"{\"ok\":true}\n");
    }

    /// The raw ack embeds the fast-path token verbatim.
    #[test]
    fn test_send_raw_ack() {
        let (conn, sink) = capture_conn();
        conn.send_raw_ack(b"\"abc\"").unwrap();
        assert_eq!(
            sink.contents(),
            b"{\"id\":\"abc\",\"result\":true,\"error\":null}\n".to_vec()
        );
    }

    /// Connections start unauthorized; authorization records the worker.
    #[test]
    fn test_authorize() {
        let (conn, _sink) = capture_conn();
        assert!(!conn.is_authorized());
        conn.authorize("w1");
        assert!(conn.is_authorized());
        assert_eq!(conn.stats().worker, "w1");
    }

    /// Retired jobs turn into stale rejections, unknown ids into not-found.
    #[test]
    fn test_lookup_job_states() {
        let (conn, _sink) = capture_conn();
        conn.add_job(job_at_height("old", 100));
        conn.add_job(job_at_height("new", 101));

        assert!(conn.lookup_job("old").is_ok());
        conn.retire_jobs_below(101);
        assert!(matches!(
            conn.lookup_job("old"),
            Err(RejectReason::StaleJob)
        ));
        assert!(conn.lookup_job("new").is_ok());
        assert!(matches!(
            conn.lookup_job("nope"),
            Err(RejectReason::JobNotFound)
        ));
    }
}
