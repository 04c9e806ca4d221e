// src/network/node.rs
use crate::utils::error::PoolError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::{Duration, Instant};

/// Configuration for connecting to a node's RPC interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// URL of the node's RPC endpoint (e.g., "http://127.0.0.1:8332")
    pub rpc_url: String,
    /// Username for RPC authentication
    pub rpc_user: String,
    /// Password for RPC authentication
    pub rpc_password: String,
    /// Per-call timeout in seconds; a stuck relay ties up one worker for at
    /// most this long
    #[serde(default = "default_rpc_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

/// Sink for winning blocks
///
/// The submission processor relays through this trait so tests can observe
/// relay behavior without a node. Implementations time their own calls;
/// the returned duration is the measured round trip.
pub trait BlockSubmitter: Send + Sync {
    /// Submits a serialized block (hex encoded) to the network.
    ///
    /// # Errors
    /// Returns `PoolError` on transport failure or when the node rejects the
    /// block. Callers log and move on; a rejected or stale block is never
    /// resubmitted blindly.
    fn submit_block(&self, block_hex: &str) -> Result<Duration, PoolError>;
}

/// Client for the node's JSON-RPC interface
///
/// Calls run synchronously on submission worker threads, so the blocking
/// HTTP client is used; its timeout bounds how long a relay can hold a
/// worker.
pub struct NodeClient {
    /// Configuration for the node connection
    config: NodeConfig,
    /// HTTP client for making RPC requests
    client: reqwest::blocking::Client,
}

impl NodeClient {
    /// Creates a new NodeClient with the given configuration
    ///
    /// # Errors
    /// Returns `PoolError` if the HTTP client cannot be constructed.
    pub fn new(config: NodeConfig) -> Result<Self, PoolError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(NodeClient { config, client })
    }

    /// Makes an RPC call to the node
    ///
    /// # Arguments
    /// * `method` - The RPC method to call
    /// * `params` - Parameters for the RPC call
    ///
    /// # Returns
    /// * `Ok(Value)` - The `result` field of the JSON-RPC response
    /// * `Err(PoolError)` - On transport failure or a non-null `error` field
    fn rpc_call(&self, method: &str, params: Value) -> Result<Value, PoolError> {
        let response: Value = self
            .client
            .post(&self.config.rpc_url)
            .basic_auth(&self.config.rpc_user, Some(&self.config.rpc_password))
            .json(&json!({
                "jsonrpc": "1.0",
                "id": "btc_pool",
                "method": method,
                "params": params
            }))
            .send()?
            .json()?;

        let error = &response["error"];
        if !error.is_null() {
            return Err(PoolError::RpcError(format!("{}: {}", method, error)));
        }
        Ok(response["result"].clone())
    }
}

impl BlockSubmitter for NodeClient {
    /// Submits a solved block via `submitblock`, timing the round trip.
    ///
    /// `submitblock` returns null on acceptance and a reason string when the
    /// node refuses the block; the latter is surfaced as an error so the
    /// caller can log it.
    fn submit_block(&self, block_hex: &str) -> Result<Duration, PoolError> {
        let started = Instant::now();
        let result = self.rpc_call("submitblock", json!([block_hex]))?;
        let elapsed = started.elapsed();

        if let Some(reason) = result.as_str() {
            return Err(PoolError::RpcError(format!(
                "submitblock rejected: {}",
                reason
            )));
        }
        log::debug!("submitblock round trip took {:?}", elapsed);
        Ok(elapsed)
    }
}
