// src/submit/processor.rs
//! Submission processing
//!
//! The state machine a worker runs for each dequeued `mining.submit`. Checks
//! run in a fixed order so every malformed or losing submission gets the
//! most specific rejection it qualifies for: authorization, job lookup,
//! parameter shape, duplicate detection, then the proof-of-work itself.
//!
//! When the read loop already acknowledged the share optimistically, a late
//! rejection is recorded in the counters and dropped without a response;
//! sending a second, contradictory reply for the same id would only confuse
//! miner-side accounting.

use crate::chain;
use crate::jobs::{Job, ShareKey, target};
use crate::protocol::messages::{StratumRequest, SubmitParams};
use crate::server::MinerConn;
use crate::submit::reject::RejectReason;
use crate::submit::task::SubmissionTask;
use serde_json::{Value, json};
use std::sync::Arc;

/// A submission that passed every check
///
/// Carries the assembled bytes so a winning share can be relayed without
/// recomputing anything.
struct EvaluatedShare {
    job: Arc<Job>,
    coinbase: Vec<u8>,
    header: [u8; 80],
    digest: [u8; 32],
    is_block: bool,
}

/// Runs one queued submission to completion.
///
/// This is the worker-side entry point. It never returns an error: every
/// outcome ends in counter updates and, when a response is still owed, a
/// response line.
pub fn process_submission_task(task: SubmissionTask) {
    let conn = Arc::clone(&task.conn);

    let request: StratumRequest = match serde_json::from_slice(&task.raw_line) {
        Ok(request) => request,
        Err(e) => {
            log::debug!("conn {}: submit line failed full decode: {}", conn.id, e);
            finish_rejected(&conn, &Value::Null, RejectReason::MalformedRequest, task.optimistic);
            return;
        }
    };

    // A rejection decided on the I/O path still gets the decoded id echoed.
    if let Some(reason) = task.policy_reject {
        finish_rejected(&conn, &request.id, reason, task.optimistic);
        return;
    }

    let params = match SubmitParams::parse(&request.params) {
        Ok(params) => params,
        Err(e) => {
            log::debug!("conn {}: bad submit params: {}", conn.id, e);
            finish_rejected(&conn, &request.id, RejectReason::MalformedParams, task.optimistic);
            return;
        }
    };

    match evaluate(&conn, &params) {
        Ok(share) => {
            conn.record_accept(share.is_block);
            log::debug!(
                "conn {}: share accepted for job {} in {:?}{}",
                conn.id,
                share.job.job_id,
                task.received_at.elapsed(),
                if share.is_block { " (block!)" } else { "" }
            );
            if share.is_block {
                relay_block(&conn, &share, &params);
            }
            if !task.optimistic {
                if let Err(e) = conn.send_success(&request.id) {
                    log::debug!("conn {}: response write failed: {}", conn.id, e);
                }
            }
        }
        Err(reason) => finish_rejected(&conn, &request.id, reason, task.optimistic),
    }
}

/// Validates a submission and scores its proof of work.
///
/// Returns the most specific [`RejectReason`] the submission earns, in
/// check order; a passing share comes back with its assembled bytes.
fn evaluate(conn: &MinerConn, params: &SubmitParams) -> Result<EvaluatedShare, RejectReason> {
    if !conn.is_authorized() {
        return Err(RejectReason::Unauthorized);
    }
    let job = conn.lookup_job(&params.job_id)?;

    let extranonce2 = hex::decode(&params.extranonce2).map_err(|_| RejectReason::MalformedParams)?;
    if extranonce2.len() != job.extranonce2_size {
        return Err(RejectReason::BadExtranonceSize);
    }
    let ntime = parse_hex_u32(&params.ntime)?;
    let nonce = parse_hex_u32(&params.nonce)?;
    let version_bits = match &params.version_bits {
        Some(bits) => Some(parse_hex_u32(bits)?),
        None => None,
    };

    // Registration happens before classification: identical submissions
    // racing through two workers collapse to one evaluation, resubmissions
    // never cost a second sha256d pass, and a share rejected on difficulty
    // answers as a duplicate when resubmitted byte-for-byte.
    let key = ShareKey::new(&params.worker, &params.extranonce2, &params.ntime, &params.nonce);
    if !job.register_share(key) {
        return Err(RejectReason::DuplicateShare);
    }

    let coinbase = chain::build_coinbase(&job, conn.extranonce1(), &extranonce2);
    let txid = chain::sha256d(&coinbase);
    let root = chain::merkle_root(txid, &job.template.merkle_branches);
    let version = chain::rolled_version(job.template.version, version_bits);
    let header = chain::build_header(&job, version, &root, ntime, nonce);

    let digest = chain::sha256d(&header);
    let value = target::hash_value(&digest);
    let is_block = target::meets_target(&value, &job.network_target);
    if !is_block && !target::meets_target(&value, conn.share_target()) {
        return Err(RejectReason::LowDifficultyShare);
    }

    Ok(EvaluatedShare {
        job,
        coinbase,
        header,
        digest,
        is_block,
    })
}

/// Persists and relays a winning block.
///
/// The durable record is written before the relay attempt: a duplicate row
/// is harmless, losing the only record of a found block is not. Relay
/// failures are logged and never retried here; the node may already have
/// the block, and a stale one will not improve on resubmission.
fn relay_block(conn: &MinerConn, share: &EvaluatedShare, params: &SubmitParams) {
    let mut display = share.digest;
    display.reverse();
    let block_hash = hex::encode(display);
    let job = &share.job;
    log::info!(
        "conn {}: block found at height {}: {}",
        conn.id,
        job.template.height,
        block_hash
    );

    if let Some(store) = conn.store() {
        let record = json!({
            "height": job.template.height,
            "hash": block_hash,
            "job_id": job.job_id,
            "worker": params.worker,
        })
        .to_string();
        if let Err(e) = store.record_found_block(&record) {
            log::error!("conn {}: failed to record found block: {}", conn.id, e);
        }
    }

    if let Some(rpc) = conn.rpc() {
        let block = chain::serialize_block(&share.header, &share.coinbase, &job.template.transactions);
        match rpc.submit_block(&hex::encode(block)) {
            Ok(elapsed) => log::info!("relayed block {} in {:?}", block_hash, elapsed),
            Err(e) => log::error!("relay of block {} failed: {}", block_hash, e),
        }
    }
}

/// Records a rejection and, unless the share was already acknowledged,
/// answers it.
fn finish_rejected(conn: &MinerConn, id: &Value, reason: RejectReason, optimistic: bool) {
    conn.record_reject();
    if optimistic {
        log::debug!(
            "conn {}: dropping late rejection ({}) for acknowledged share",
            conn.id,
            reason
        );
        return;
    }
    if let Err(e) = conn.send_error(id, reason) {
        log::debug!("conn {}: response write failed: {}", conn.id, e);
    }
}

/// Parses an 8-hex-char field (ntime, nonce, version bits).
fn parse_hex_u32(field: &str) -> Result<u32, RejectReason> {
    if field.len() != 8 {
        return Err(RejectReason::MalformedParams);
    }
    u32::from_str_radix(field, 16).map_err(|_| RejectReason::MalformedParams)
}
