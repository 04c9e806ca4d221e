// src/server/mod.rs
//! Connection handling
//!
//! The accept loop runs on the tokio runtime; each accepted socket is moved
//! onto a blocking task that owns the synchronous read loop. Synchronous
//! reads keep the backpressure story honest: when the submission queue is
//! full, the producing read loop blocks on enqueue and the flooding client
//! stalls with it.
//!
//! The read loop does as little as possible per line: fast-path extraction,
//! the optimistic acknowledgement, and the queue handoff. Everything else
//! happens on a worker.

/// Per-miner connection state and response writing
pub mod conn;

pub use conn::{ConnStats, MinerConn};

use crate::config::Config;
use crate::jobs::{JobRegistry, target};
use crate::network::BlockSubmitter;
use crate::protocol::{fast_mining_submit_id, messages};
use crate::state::StateStore;
use crate::submit::reject::RejectReason;
use crate::submit::task::SubmissionTask;
use crate::submit::worker::SubmissionWorkerPool;
use crate::utils::error::PoolError;
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stratum server frontend
///
/// Owns the shared collaborators every connection needs: the worker pool,
/// the job registry, and the optional node RPC and state store handles.
pub struct Server {
    config: Config,
    pool: Arc<SubmissionWorkerPool>,
    registry: Arc<JobRegistry>,
    rpc: Option<Arc<dyn BlockSubmitter>>,
    store: Option<Arc<StateStore>>,
    next_conn_id: AtomicU64,
}

impl Server {
    /// Assembles a server from its collaborators.
    pub fn new(
        config: Config,
        pool: Arc<SubmissionWorkerPool>,
        registry: Arc<JobRegistry>,
        rpc: Option<Arc<dyn BlockSubmitter>>,
        store: Option<Arc<StateStore>>,
    ) -> Self {
        Server {
            config,
            pool,
            registry,
            rpc,
            store,
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Job registry shared with template publishers.
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Accepts connections forever.
    ///
    /// # Errors
    /// Returns `PoolError` if the listen address cannot be bound; per-
    /// connection failures are logged and do not stop the loop.
    pub async fn run(&self) -> Result<(), PoolError> {
        let listener = tokio::net::TcpListener::bind(&self.config.listen).await?;
        log::info!("listening on {}", self.config.listen);
        loop {
            let (socket, peer) = listener.accept().await?;
            log::info!("accepted connection from {}", peer);
            if let Err(e) = self.spawn_conn(socket) {
                log::warn!("failed to set up connection from {}: {}", peer, e);
            }
        }
    }

    /// Moves an accepted socket onto its blocking read loop.
    fn spawn_conn(&self, socket: tokio::net::TcpStream) -> Result<(), PoolError> {
        let stream = socket.into_std()?;
        stream.set_nonblocking(false)?;
        let write_half = stream.try_clone()?;

        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let mut conn = MinerConn::new(format!("conn-{}", conn_id), Box::new(write_half))
            .with_extranonce1((conn_id as u32).to_be_bytes().to_vec())
            .with_share_target(target::share_target_from_difficulty(
                self.config.pool_difficulty,
            ));
        if let Some(rpc) = &self.rpc {
            conn = conn.with_rpc(Arc::clone(rpc));
        }
        if let Some(store) = &self.store {
            conn = conn.with_store(Arc::clone(store));
        }
        let conn = Arc::new(conn);

        // Authorization handshakes are owned by the surrounding process;
        // without the flag every submission rejects as unauthorized.
        if !self.config.require_authorization {
            conn.authorize("default");
        }
        if let Some(job) = self.registry.current() {
            conn.add_job(job);
        }

        let pool = Arc::clone(&self.pool);
        let reader = BufReader::new(stream);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = run_read_loop(&conn, reader, &pool) {
                log::debug!("conn {} read loop ended: {}", conn.id, e);
            }
            log::info!("conn {} disconnected", conn.id);
        });
        Ok(())
    }
}

/// Drives one connection until EOF or a read error.
///
/// Each line is handled inline; the only suspension points are the next
/// line of input and, under backpressure, the queue handoff inside
/// [`handle_line`].
pub fn run_read_loop<R: BufRead>(
    conn: &Arc<MinerConn>,
    reader: R,
    pool: &SubmissionWorkerPool,
) -> Result<(), PoolError> {
    for line in reader.split(b'\n') {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }
        handle_line(conn, line, pool);
    }
    Ok(())
}

/// Handles one request line on the I/O path.
///
/// The fast path acknowledges submissions optimistically and hands the raw
/// bytes to the worker pool; everything else falls back to a full decode.
/// The extracted id token aliases `line`, so the acknowledgement is written
/// before the buffer moves into the task.
pub fn handle_line(conn: &Arc<MinerConn>, line: Vec<u8>, pool: &SubmissionWorkerPool) {
    if let Some(id_raw) = fast_mining_submit_id(&line) {
        let mut optimistic = false;
        let mut policy_reject = None;
        if conn.is_authorized() {
            match conn.send_raw_ack(id_raw) {
                Ok(()) => optimistic = true,
                Err(e) => log::debug!("conn {}: optimistic ack failed: {}", conn.id, e),
            }
        } else {
            policy_reject = Some(RejectReason::Unauthorized);
        }
        pool.submit(SubmissionTask::new(
            Arc::clone(conn),
            line,
            optimistic,
            policy_reject,
        ));
        return;
    }

    match serde_json::from_slice::<messages::StratumRequest>(&line) {
        Ok(req) if req.method == messages::METHOD_SUBMIT => {
            // Fast path declined (unusual shape); workers decode fully.
            pool.submit(SubmissionTask::new(Arc::clone(conn), line, false, None));
        }
        Ok(req) => {
            log::debug!("conn {}: unsupported method {:?}", conn.id, req.method);
            if let Err(e) =
                conn.write_line(messages::unsupported_method_response(&req.id).as_bytes())
            {
                log::debug!("conn {}: write failed: {}", conn.id, e);
            }
        }
        Err(e) => {
            log::debug!("conn {}: undecodable request line: {}", conn.id, e);
            if let Err(e) = conn.send_error(&Value::Null, RejectReason::MalformedRequest) {
                log::debug!("conn {}: write failed: {}", conn.id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::conn::testutil::CaptureSink;
    use super::*;

    fn test_pool() -> Arc<SubmissionWorkerPool> {
        SubmissionWorkerPool::new(1)
    }

    fn authorized_conn() -> (Arc<MinerConn>, CaptureSink) {
        let sink = CaptureSink::default();
        let conn = Arc::new(MinerConn::new("test", Box::new(sink.clone())));
        conn.authorize("w1");
        (conn, sink)
    }

    /// A well-formed submit line gets its optimistic acknowledgement on the
    /// I/O path, before any worker has touched the task.
    #[test]
    fn test_submit_line_acked_optimistically() {
        let (conn, sink) = authorized_conn();
        let pool = test_pool();
        handle_line(
            &conn,
            br#"{"id":7,"method":"mining.submit","params":["w1","j1","00000000","6553f100","00000001"]}"#
                .to_vec(),
            &pool,
        );
        let written = sink.contents();
        let first_line = written.split(|&b| b == b'\n').next().unwrap();
        assert_eq!(first_line, br#"{"id":7,"result":true,"error":null}"#);
    }

    /// Unsupported methods are answered immediately with a stable error.
    #[test]
    fn test_unknown_method_rejected_inline() {
        let (conn, sink) = authorized_conn();
        let pool = test_pool();
        handle_line(
            &conn,
            br#"{"id":1,"method":"mining.ping","params":[]}"#.to_vec(),
            &pool,
        );
        let written = String::from_utf8(sink.contents()).unwrap();
        assert!(written.contains("Method not supported"), "{}", written);
    }

    /// Lines that do not decode at all produce a malformed-request error
    /// with a null id.
    #[test]
    fn test_undecodable_line_rejected_inline() {
        let (conn, sink) = authorized_conn();
        let pool = test_pool();
        handle_line(&conn, b"not json".to_vec(), &pool);
        let written = String::from_utf8(sink.contents()).unwrap();
        assert!(written.contains("Malformed request"), "{}", written);
    }
}
