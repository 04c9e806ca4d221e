// src/config/config.rs
use crate::{network::node::NodeConfig, utils::error::PoolError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for the pool server
///
/// Contains all settings needed to run the share-submission engine:
/// the listen endpoint, share-difficulty policy, coinbase parameters,
/// and the optional node RPC connection used to relay winning blocks.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Address the Stratum listener binds to
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory holding the pool's durable state (found-blocks database)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Pool share difficulty; the per-connection share target is
    /// difficulty-1 divided by this value
    #[serde(default = "default_pool_difficulty")]
    pub pool_difficulty: u64,

    /// Required byte length of miner-chosen extranonce2 values
    #[serde(default = "default_extranonce2_size")]
    pub extranonce2_size: usize,

    /// Free-form tag embedded in the coinbase scriptSig
    #[serde(default = "default_coinbase_msg")]
    pub coinbase_msg: String,

    /// Payout scriptPubKey for the coinbase output, hex encoded
    #[serde(default)]
    pub payout_script: String,

    /// Number of submission worker threads (0 = auto-detect)
    #[serde(default)]
    pub worker_threads: usize,

    /// Whether connections must authorize before submitting shares
    #[serde(default = "default_require_authorization")]
    pub require_authorization: bool,

    /// Node RPC connection for block relay; omit to run without one
    pub node: Option<NodeConfig>,
}

fn default_listen() -> String {
    "0.0.0.0:3333".into()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_pool_difficulty() -> u64 {
    16
}

fn default_extranonce2_size() -> usize {
    4
}

fn default_coinbase_msg() -> String {
    "btc_pool".into()
}

fn default_require_authorization() -> bool {
    true
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(PoolError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PoolError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            PoolError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&config_str)
            .map_err(|e| PoolError::ConfigError(format!("Invalid config format: {}", e)))
    }

    /// Decodes the configured payout script from hex.
    ///
    /// # Errors
    /// Returns `PoolError::ConfigError` when the field is empty or not
    /// valid hex; an empty payout script would burn the coinbase value.
    pub fn payout_script_bytes(&self) -> Result<Vec<u8>, PoolError> {
        if self.payout_script.is_empty() {
            return Err(PoolError::ConfigError(
                "payout_script must be set (hex scriptPubKey)".to_string(),
            ));
        }
        hex::decode(&self.payout_script)
            .map_err(|e| PoolError::ConfigError(format!("Invalid payout_script hex: {}", e)))
    }

    /// Generates a configuration template string
    ///
    /// # Arguments
    /// * `node` - Include the node RPC configuration section
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template(node: bool) -> String {
        let mut template = String::new();
        template.push_str("# Pool server configuration\n\n");
        template.push_str("# Stratum listen address\n");
        template.push_str("listen = \"0.0.0.0:3333\"\n");
        template.push_str("# Durable state directory\n");
        template.push_str("data_dir = \"./data\"\n");
        template.push_str("# Pool share difficulty\n");
        template.push_str("pool_difficulty = 16\n");
        template.push_str("# Extranonce2 byte length miners must use\n");
        template.push_str("extranonce2_size = 4\n");
        template.push_str("# Coinbase scriptSig tag\n");
        template.push_str("coinbase_msg = \"btc_pool\"\n");
        template.push_str("# Payout scriptPubKey, hex\n");
        template.push_str("payout_script = \"76a914...88ac\"\n");
        template.push_str("# Submission worker threads (0 = auto-detect)\n");
        template.push_str("worker_threads = 0\n");
        template.push_str("# Require mining.authorize before submissions\n");
        template.push_str("require_authorization = true\n");

        if node {
            template.push_str("\n# Node RPC used to relay winning blocks\n");
            template.push_str("[node]\n");
            template.push_str("rpc_url = \"http://127.0.0.1:8332\"\n");
            template.push_str("rpc_user = \"bitcoin\"\n");
            template.push_str("rpc_password = \"password\"\n");
            template.push_str("timeout_secs = 30\n");
        }

        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal config picks up every default and no node section.
    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("payout_script = \"51\"").unwrap();
        assert_eq!(config.listen, "0.0.0.0:3333");
        assert_eq!(config.pool_difficulty, 16);
        assert_eq!(config.extranonce2_size, 4);
        assert_eq!(config.worker_threads, 0);
        assert!(config.require_authorization);
        assert!(config.node.is_none());
        assert_eq!(config.payout_script_bytes().unwrap(), vec![0x51]);
    }

    /// The generated template parses back, with and without the node block.
    #[test]
    fn test_template_round_trips() {
        let config: Config = toml::from_str(&Config::generate_template(false)).unwrap();
        assert!(config.node.is_none());

        let config: Config = toml::from_str(&Config::generate_template(true)).unwrap();
        let node = config.node.unwrap();
        assert_eq!(node.rpc_url, "http://127.0.0.1:8332");
        assert_eq!(node.timeout_secs, 30);
    }

    /// A missing payout script is a configuration error, not a silent burn.
    #[test]
    fn test_empty_payout_script_rejected() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.payout_script_bytes().is_err());
    }
}
