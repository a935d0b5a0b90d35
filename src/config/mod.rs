use crate::onchain::RetryPolicy;
use crate::settle::SettlementSettings;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required env var: {0}")]
    MissingEnv(String),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("invalid safe address {0}")]
    InvalidAddress(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub positions: PositionsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Polygon JSON-RPC endpoint - env RPC_URL overrides
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Gas limit for every execTransaction
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Seconds to wait for a receipt before giving up on a submission
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    /// Retries for read calls (nonce, hash, balances, resolution)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

#[derive(Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Polymarket proxy (Gnosis Safe) holding the positions - env POLYMARKET_PROXY_ADDRESS
    #[serde(default)]
    pub safe_address: String,
    /// Safe owner key - loaded from env PRIVATE_KEY only
    #[serde(skip)]
    pub private_key: String,
}

impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("safe_address", &self.safe_address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionsConfig {
    /// Data API base URL - env POLY_DATA_API_URL overrides
    #[serde(default = "default_data_api_url")]
    pub data_api_url: String,
    /// Smallest position size (in shares) the data API returns
    #[serde(default = "default_size_threshold")]
    pub size_threshold: f64,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_rpc_url() -> String {
    "https://polygon-rpc.com".to_string()
}
fn default_gas_limit() -> u64 {
    500_000
}
fn default_receipt_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    250
}
fn default_data_api_url() -> String {
    "https://data-api.polymarket.com".to_string()
}
fn default_size_threshold() -> f64 {
    1.0
}
fn default_page_limit() -> u32 {
    100
}
fn default_max_pages() -> u32 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            gas_limit: default_gas_limit(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for PositionsConfig {
    fn default() -> Self {
        Self {
            data_api_url: default_data_api_url(),
            size_threshold: default_size_threshold(),
            page_limit: default_page_limit(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.overlay_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Defaults plus environment (no file needed).
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.overlay_env(|name| std::env::var(name).ok());
        config
    }

    fn overlay_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("PRIVATE_KEY") {
            self.wallet.private_key = key;
        }
        if let Some(safe) = var("POLYMARKET_PROXY_ADDRESS") {
            self.wallet.safe_address = safe;
        }
        if let Some(url) = var("RPC_URL") {
            self.chain.rpc_url = url;
        }
        if let Some(url) = var("POLY_DATA_API_URL") {
            self.positions.data_api_url = url;
        }
    }

    /// Reject settings that would make every settlement fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid("chain.rpc_url is empty".to_string()));
        }
        if self.chain.gas_limit == 0 {
            return Err(ConfigError::Invalid("chain.gas_limit must be > 0".to_string()));
        }
        if self.chain.receipt_timeout_secs == 0 {
            return Err(ConfigError::Invalid("chain.receipt_timeout_secs must be > 0".to_string()));
        }
        if self.positions.data_api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("positions.data_api_url is empty".to_string()));
        }
        Ok(())
    }

    pub fn settlement_settings(&self) -> SettlementSettings {
        SettlementSettings {
            gas_limit: self.chain.gas_limit,
            receipt_timeout: Duration::from_secs(self.chain.receipt_timeout_secs),
            retry: RetryPolicy {
                max_retries: self.chain.max_retries,
                base_delay: Duration::from_millis(self.chain.retry_base_delay_ms),
            },
        }
    }
}

/// Owner key and the Safe it signs for. Both are required before any
/// settlement action.
pub struct Credentials {
    pub signer: PrivateKeySigner,
    pub safe: Address,
}

impl Credentials {
    pub fn from_config(wallet: &WalletConfig) -> Result<Self, ConfigError> {
        let key = wallet.private_key.trim();
        if key.is_empty() {
            return Err(ConfigError::MissingEnv("PRIVATE_KEY".to_string()));
        }
        let safe = wallet.safe_address.trim();
        if safe.is_empty() {
            return Err(ConfigError::MissingEnv("POLYMARKET_PROXY_ADDRESS".to_string()));
        }

        let signer = PrivateKeySigner::from_str(key.trim_start_matches("0x"))
            .map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        let safe = Address::from_str(safe).map_err(|_| ConfigError::InvalidAddress(safe.to_string()))?;
        Ok(Self { signer, safe })
    }
}
