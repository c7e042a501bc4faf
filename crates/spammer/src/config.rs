//! Configuration types.
//!
//! The configuration file is TOML:
//!
//! ```toml
//! [custom]
//! mnemonics = ["..."]
//! gas_limit = 200000
//! fee_amount = 5000
//! memo = ""
//!
//! [client]
//! request_timeout = "10s"
//! poll_interval = "500ms"
//!
//! [[ibc.chains]]
//! chain_id = "gaia"
//! rpc = "http://127.0.0.1:26657"
//! rest = "http://127.0.0.1:1317"
//! token_denom = "uatom"
//! account_prefix = "cosmos"
//! account_hd_path = "m/44'/118'/0'/0/0"
//! dst_address = "cosmos1..."
//! ```
//!
//! Account and IBC channel queries go through the node's REST gateway
//! (port 1317 by default), not its gRPC port (9090). The `grpc` key is
//! accepted as an alias for `rest`, but it must still name the gateway URL.

use ibcload_types::{ChainTarget, Coin, CoinError, RunParametersError, TxFee};
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Signing identities and fee parameters.
    pub custom: CustomConfig,

    /// Node client behaviour.
    #[serde(default)]
    pub client: ClientConfig,

    /// Chains available to the run.
    #[serde(alias = "ibcconfig")]
    pub ibc: IbcConfig,
}

/// Signing identities, fees and memo.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomConfig {
    /// Ordered mnemonics; destination `i` signs with mnemonic `i`.
    #[serde(default)]
    pub mnemonics: Vec<String>,

    /// Gas limit of every transaction.
    pub gas_limit: u64,

    /// Fee paid per transaction, in the source chain's token denom.
    pub fee_amount: u64,

    /// Memo attached to every transaction.
    #[serde(default)]
    pub memo: String,
}

/// Chain table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IbcConfig {
    #[serde(default)]
    pub chains: Vec<ChainTarget>,
}

/// How to treat a non-zero broadcast code other than mempool-full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionPolicy {
    /// Count the transaction as sent and keep filling the block.
    #[default]
    Count,
    /// Stop the chain's loop with an error.
    Fail,
}

/// Chain endpoint client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout for a single HTTP request.
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,

    /// Interval between status polls while waiting for a height.
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,

    /// Give up waiting for a height after this long.
    #[serde(deserialize_with = "deserialize_duration")]
    pub wait_timeout: Duration,

    /// Refuse to wait for a height more than this many blocks ahead.
    pub max_wait_blocks: u64,

    /// Handling of non-saturation rejections.
    pub rejection_policy: RejectionPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            wait_timeout: Duration::from_secs(300),
            max_wait_blocks: 10,
            rejection_policy: RejectionPolicy::Count,
        }
    }
}

impl ClientConfig {
    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the height poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the height wait timeout.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set the maximum number of blocks a height wait may span.
    pub fn with_max_wait_blocks(mut self, blocks: u64) -> Self {
        self.max_wait_blocks = blocks;
        self
    }

    /// Set the rejection policy.
    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("client.poll_interval must be > 0".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "client.request_timeout must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

impl AppConfig {
    /// Default configuration file location.
    pub const DEFAULT_PATH: &'static str = "config.toml";

    /// Read and validate a configuration file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client.validate()?;

        let mut seen = HashSet::new();
        for chain in &self.ibc.chains {
            if !seen.insert(chain.chain_id.as_str()) {
                return Err(ConfigError::DuplicateChain(chain.chain_id.to_string()));
            }
            for (field, value) in [
                ("rpc", &chain.rpc),
                ("rest", &chain.rest),
                ("token_denom", &chain.token_denom),
                ("account_prefix", &chain.account_prefix),
                ("account_hd_path", &chain.account_hd_path),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::MissingField {
                        chain: chain.chain_id.to_string(),
                        field,
                    });
                }
            }
        }
        Ok(())
    }

    /// Look up a chain by id.
    pub fn chain(&self, chain_id: &str) -> Option<&ChainTarget> {
        self.ibc
            .chains
            .iter()
            .find(|chain| chain.chain_id.as_str() == chain_id)
    }

    /// Look up a chain by id, naming its role in the error.
    pub fn require_chain(&self, chain_id: &str, role: &'static str) -> Result<&ChainTarget, ConfigError> {
        self.chain(chain_id).ok_or_else(|| ConfigError::UnknownChain {
            role,
            chain: chain_id.to_string(),
        })
    }

    /// Mnemonic at `index`.
    pub fn mnemonic(&self, index: usize) -> Result<&str, ConfigError> {
        self.custom
            .mnemonics
            .get(index)
            .map(String::as_str)
            .ok_or(ConfigError::NotEnoughMnemonics {
                needed: index + 1,
                available: self.custom.mnemonics.len(),
            })
    }

    /// Fee and memo for transactions sent from `chain`.
    pub fn fee_for(&self, chain: &ChainTarget) -> TxFee {
        TxFee {
            amount: Coin::new(chain.token_denom.clone(), u128::from(self.custom.fee_amount)),
            gas_limit: self.custom.gas_limit,
            memo: self.custom.memo.clone(),
        }
    }
}

/// Configuration errors. Always fatal before any task starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Chain {chain} is missing '{field}'")]
    MissingField { chain: String, field: &'static str },

    #[error("Chain {0} is defined more than once")]
    DuplicateChain(String),

    #[error("The entered {role} chain '{chain}' does not exist in config")]
    UnknownChain { role: &'static str, chain: String },

    #[error("Need {needed} mnemonics but only {available} are configured")]
    NotEnoughMnemonics { needed: usize, available: usize },

    #[error("Invalid run parameters: {0}")]
    RunParameters(#[from] RunParametersError),

    #[error("Invalid amount: {0}")]
    Coin(#[from] CoinError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
