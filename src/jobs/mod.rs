// src/jobs/mod.rs
//! Job management
//!
//! A [`Job`] is an immutable snapshot of a block-template assignment miners
//! work against. Jobs are created when a new template is broadcast and
//! retired when superseded or when the chain height advances; a submission
//! referencing a retired job is rejected as stale. The only mutable part of
//! a job is its synchronized seen-share record, used for duplicate
//! detection under concurrent worker evaluation.

/// Target arithmetic (compact bits expansion, share targets, hash compare)
pub mod target;

use crate::utils::error::PoolError;
use arc_swap::ArcSwap;
use num_bigint::BigUint;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Block-template fields a job is built from
///
/// Populated by the template constructor (outside this crate's core) from
/// the node's `getblocktemplate` response. All fields are fixed once the
/// job is published.
#[derive(Debug, Clone, Default)]
pub struct BlockTemplate {
    /// Block height being mined
    pub height: u64,
    /// Header version advertised by the template
    pub version: i32,
    /// Previous block hash, 64 hex chars in RPC (big-endian) order
    pub prev_hash: String,
    /// Header timestamp suggested by the template
    pub cur_time: u32,
    /// Compact difficulty bits, 8 hex chars
    pub bits: String,
    /// Total coinbase value in satoshis (subsidy plus fees)
    pub coinbase_value: u64,
    /// Non-coinbase transactions, fully serialized
    pub transactions: Vec<Vec<u8>>,
    /// Merkle branch hashes pairing the coinbase up to the root, internal order
    pub merkle_branches: Vec<[u8; 32]>,
    /// Ready-made witness commitment scriptPubKey, empty when absent
    pub witness_commitment: Vec<u8>,
}

/// Key identifying one submitted share within a job
///
/// Hex fields are lowercased so duplicate detection is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShareKey {
    worker: String,
    extranonce2: String,
    ntime: String,
    nonce: String,
}

impl ShareKey {
    /// Builds a normalized share key from submitted fields.
    pub fn new(worker: &str, extranonce2: &str, ntime: &str, nonce: &str) -> Self {
        ShareKey {
            worker: worker.to_string(),
            extranonce2: extranonce2.to_ascii_lowercase(),
            ntime: ntime.to_ascii_lowercase(),
            nonce: nonce.to_ascii_lowercase(),
        }
    }
}

/// An immutable block-template assignment miners mine against
///
/// Target and validation parameters never change after publication; any
/// recomputation produces a new job with a new id.
#[derive(Debug)]
pub struct Job {
    /// Job identifier sent to miners with `mining.notify`
    pub job_id: String,
    /// Template snapshot this job was built from
    pub template: BlockTemplate,
    /// Network target expanded from the template's difficulty bits; a hash
    /// at or below it is a winning block
    pub network_target: BigUint,
    /// Previous block hash in header (internal little-endian) byte order
    pub prev_hash: [u8; 32],
    /// Compact difficulty bits as an integer, for header assembly
    pub bits: u32,
    /// Required decoded byte length of submitted extranonce2 values
    pub extranonce2_size: usize,
    /// Payout scriptPubKey for the coinbase output
    pub payout_script: Vec<u8>,
    /// Free-form coinbase tag embedded in the coinbase scriptSig
    pub coinbase_msg: String,
    /// Accepted (worker, extranonce2, ntime, nonce) tuples for this job.
    /// Workers evaluate concurrently, so access is synchronized.
    seen_shares: Mutex<HashSet<ShareKey>>,
}

impl Job {
    /// Creates a job from a template, deriving the network target and the
    /// header-order previous hash from the template fields.
    ///
    /// # Errors
    /// Returns `PoolError::InputError` if the template's previous hash is
    /// not 32 hex-encoded bytes or its bits field does not parse.
    pub fn new(
        job_id: impl Into<String>,
        template: BlockTemplate,
        extranonce2_size: usize,
        payout_script: Vec<u8>,
        coinbase_msg: impl Into<String>,
    ) -> Result<Self, PoolError> {
        let network_target = target::target_from_bits(&template.bits)?;
        let bits = u32::from_str_radix(&template.bits, 16)
            .map_err(|e| PoolError::InputError(format!("bad bits {:?}: {}", template.bits, e)))?;

        let decoded = hex::decode(&template.prev_hash)?;
        let mut prev_hash: [u8; 32] = decoded.try_into().map_err(|_| {
            PoolError::InputError("previous hash must decode to 32 bytes".to_string())
        })?;
        // RPC order is big-endian; headers carry it reversed.
        prev_hash.reverse();

        Ok(Job {
            job_id: job_id.into(),
            template,
            network_target,
            prev_hash,
            bits,
            extranonce2_size,
            payout_script,
            coinbase_msg: coinbase_msg.into(),
            seen_shares: Mutex::new(HashSet::new()),
        })
    }

    /// Records a share tuple, returning `true` the first time it is seen and
    /// `false` for a duplicate. Safe under concurrent evaluation.
    pub fn register_share(&self, key: ShareKey) -> bool {
        // A worker that panicked while holding the lock must not poison
        // duplicate detection for everyone else.
        self.seen_shares
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }
}

/// Registry of published jobs
///
/// The current job is held behind an atomically swappable pointer so the
/// read path never blocks on a publisher; the id index uses a mutex since
/// lookups are off the connection's I/O path.
pub struct JobRegistry {
    /// Most recently published job
    current: ArcSwap<Option<Arc<Job>>>,
    /// All live jobs by id
    jobs: Mutex<HashMap<String, Arc<Job>>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        JobRegistry {
            current: ArcSwap::from_pointee(None),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Publishes a job, making it the current assignment and indexing it for
    /// lookup.
    pub fn publish(&self, job: Arc<Job>) {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.job_id.clone(), Arc::clone(&job));
        self.current.store(Arc::new(Some(job)));
    }

    /// Looks a job up by id; `None` means not-found (never published, or
    /// already retired).
    pub fn lookup(&self, job_id: &str) -> Option<Arc<Job>> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    /// Returns the most recently published job, if any.
    pub fn current(&self) -> Option<Arc<Job>> {
        self.current.load().as_ref().clone()
    }

    /// Retires every job below the given height, returning the retired ids
    /// so connections can mark them stale.
    pub fn retire_below(&self, height: u64) -> Vec<String> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let retired: Vec<String> = jobs
            .iter()
            .filter(|(_, job)| job.template.height < height)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &retired {
            jobs.remove(id);
        }
        retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_template(height: u64) -> BlockTemplate {
        BlockTemplate {
            height,
            version: 0x2000_0000,
            prev_hash: "00000000000000000000000000000000000000000000000000000000000000ff"
                .to_string(),
            cur_time: 1_700_000_000,
            bits: "1d00ffff".to_string(),
            coinbase_value: 50 * 100_000_000,
            ..Default::default()
        }
    }

    fn test_job(id: &str, height: u64) -> Job {
        Job::new(id, test_template(height), 4, vec![0x51], "test").unwrap()
    }

    /// Job construction derives the target from the bits field and reverses
    /// the previous hash into header order.
    #[test]
    fn test_job_derives_header_fields() {
        let job = test_job("j1", 100);
        assert_eq!(job.network_target, target::target_from_bits("1d00ffff").unwrap());
        assert_eq!(job.bits, 0x1d00ffff);
        assert_eq!(job.prev_hash[0], 0xff);
        assert!(job.prev_hash[1..].iter().all(|&b| b == 0));
    }

    /// A template with a truncated previous hash must not build a job.
    #[test]
    fn test_job_rejects_bad_prev_hash() {
        let mut tpl = test_template(100);
        tpl.prev_hash = "abcd".to_string();
        assert!(Job::new("j1", tpl, 4, vec![0x51], "test").is_err());
    }

    /// First registration of a tuple succeeds, the identical tuple is a
    /// duplicate, and hex case does not defeat detection.
    #[test]
    fn test_register_share_duplicates() {
        let job = test_job("j1", 100);
        assert!(job.register_share(ShareKey::new("w", "aabb", "6553f100", "0000ffff")));
        assert!(!job.register_share(ShareKey::new("w", "aabb", "6553f100", "0000ffff")));
        assert!(!job.register_share(ShareKey::new("w", "AABB", "6553F100", "0000FFFF")));
        // A different nonce is a new share.
        assert!(job.register_share(ShareKey::new("w", "aabb", "6553f100", "0000fffe")));
    }

    /// Publishing makes a job current and retiring below a height removes
    /// only older jobs.
    #[test]
    fn test_registry_publish_lookup_retire() {
        let registry = JobRegistry::new();
        assert!(registry.current().is_none());
        assert!(registry.lookup("j1").is_none());

        registry.publish(Arc::new(test_job("j1", 100)));
        registry.publish(Arc::new(test_job("j2", 101)));
        assert_eq!(registry.current().unwrap().job_id, "j2");
        assert!(registry.lookup("j1").is_some());

        let retired = registry.retire_below(101);
        assert_eq!(retired, vec!["j1".to_string()]);
        assert!(registry.lookup("j1").is_none());
        assert!(registry.lookup("j2").is_some());
    }
}
