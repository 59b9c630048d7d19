//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the gateway tools.
//! Configuration includes chain endpoints, factory addresses, the names of the
//! environment variables holding signing keys, and correlation polling settings.
//! Nothing is read from the environment at load time except the config path.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::address::{EvmAddress, TronAddress};
use crate::factory::FactoryMethod;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure.
///
/// - Correlation settings (poll interval, attempt budget, receipt timeout)
/// - One or more chain entries (use `[[chain]]` in TOML, each with a `type` field)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Correlation settings
    #[serde(default)]
    pub service: ServiceConfig,
    /// Chain configurations
    #[serde(default)]
    pub chain: Vec<ChainConfig>,
}

/// Polling and timeout settings for transaction correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Interval between event polls in milliseconds
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Maximum number of polls before declaring a timeout
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Maximum number of receipt polls after submitting an EVM transaction
    #[serde(default = "default_receipt_poll_attempts")]
    pub receipt_poll_attempts: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: default_polling_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            receipt_poll_attempts: default_receipt_poll_attempts(),
        }
    }
}

impl ServiceConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}

/// A chain entry; the `type` field selects the family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChainConfig {
    /// EVM chain configuration
    #[serde(rename = "evm")]
    Evm(EvmChainConfig),
    /// Tron chain configuration
    #[serde(rename = "tvm")]
    Tvm(TvmChainConfig),
}

impl ChainConfig {
    pub fn name(&self) -> &str {
        match self {
            ChainConfig::Evm(cfg) => &cfg.name,
            ChainConfig::Tvm(cfg) => &cfg.name,
        }
    }

    pub fn chain_type(&self) -> &'static str {
        match self {
            ChainConfig::Evm(_) => "evm",
            ChainConfig::Tvm(_) => "tvm",
        }
    }
}

/// Configuration for an EVM chain (Sepolia, Hardhat node, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmChainConfig {
    /// Human-readable name used to select the chain on the command line
    pub name: String,
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Chain ID used for EIP-155 signing (11155111 for Sepolia, 31337 for Hardhat)
    pub chain_id: u64,
    /// Deployed Gateway factory address (absent before `deploy`)
    #[serde(default)]
    pub factory_addr: Option<String>,
    /// Environment variable holding the owner's hex private key
    pub private_key_env: String,
    /// Factory creation entry point
    #[serde(default = "default_evm_factory_method")]
    pub factory_method: FactoryMethod,
    /// ERC20 token used for balance queries (e.g. USDT)
    #[serde(default)]
    pub token_addr: Option<String>,
    /// Decimals of `token_addr`
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,
}

/// Configuration for a Tron node (Shasta, local quickstart, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvmChainConfig {
    /// Human-readable name used to select the chain on the command line
    pub name: String,
    /// Full node HTTP endpoint (e.g. "http://127.0.0.1:9090")
    pub full_node_url: String,
    /// Event server endpoint; defaults to the full node
    #[serde(default)]
    pub event_server_url: Option<String>,
    /// Deployed Gateway factory address (base58 or hex)
    #[serde(default)]
    pub factory_addr: Option<String>,
    /// Environment variable holding the owner's hex private key
    pub private_key_env: String,
    /// Factory creation entry point
    #[serde(default = "default_tvm_factory_method")]
    pub factory_method: FactoryMethod,
    /// Maximum energy fee for contract calls, in sun
    #[serde(default = "default_fee_limit")]
    pub fee_limit: u64,
    /// TRC20 token used for balance queries (e.g. USDT)
    #[serde(default)]
    pub token_addr: Option<String>,
    /// Decimals of `token_addr`
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,
}

impl TvmChainConfig {
    pub fn event_server_url(&self) -> &str {
        self.event_server_url
            .as_deref()
            .unwrap_or(&self.full_node_url)
    }
}

fn default_polling_interval_ms() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    10
}

fn default_receipt_poll_attempts() -> u32 {
    60
}

fn default_evm_factory_method() -> FactoryMethod {
    FactoryMethod::CreateWallet
}

fn default_tvm_factory_method() -> FactoryMethod {
    FactoryMethod::Create
}

fn default_fee_limit() -> u64 {
    1_000_000_000
}

fn default_token_decimals() -> u32 {
    6
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl GatewayConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Path priority: provided path > `GATEWAY_CONFIG_PATH` env var > `config/gateway.toml`.
    ///
    /// # Returns
    ///
    /// * `Ok(GatewayConfig)` - Successfully loaded and validated configuration
    /// * `Err(anyhow::Error)` - File missing, unparsable or invalid
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("GATEWAY_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/gateway.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config = Self::from_toml_str(&content)?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/gateway.template.toml config/gateway.toml\n\
                Then edit config/gateway.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Loads configuration from the default location.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: GatewayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Finds a chain entry by name.
    pub fn get_chain(&self, name: &str) -> Option<&ChainConfig> {
        self.chain.iter().find(|c| c.name() == name)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks:
    /// - At least one chain is configured and names are unique
    /// - Polling interval and attempt budgets are non-zero
    /// - Factory and token addresses parse for their chain family
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chain.is_empty() {
            anyhow::bail!("Configuration error: At least one [[chain]] must be configured");
        }

        if self.service.polling_interval_ms == 0 {
            anyhow::bail!("Configuration error: polling_interval_ms must be greater than zero");
        }
        if self.service.max_poll_attempts == 0 {
            anyhow::bail!("Configuration error: max_poll_attempts must be greater than zero");
        }
        if self.service.receipt_poll_attempts == 0 {
            anyhow::bail!("Configuration error: receipt_poll_attempts must be greater than zero");
        }

        for i in 0..self.chain.len() {
            for j in (i + 1)..self.chain.len() {
                if self.chain[i].name() == self.chain[j].name() {
                    anyhow::bail!(
                        "Configuration error: Chain name '{}' is used more than once",
                        self.chain[i].name()
                    );
                }
            }
        }

        for chain in &self.chain {
            match chain {
                ChainConfig::Evm(cfg) => {
                    for addr in [&cfg.factory_addr, &cfg.token_addr].into_iter().flatten() {
                        addr.parse::<EvmAddress>().map_err(|e| {
                            anyhow::anyhow!("Invalid address for evm chain '{}': {}", cfg.name, e)
                        })?;
                    }
                }
                ChainConfig::Tvm(cfg) => {
                    for addr in [&cfg.factory_addr, &cfg.token_addr].into_iter().flatten() {
                        addr.parse::<TronAddress>().map_err(|e| {
                            anyhow::anyhow!("Invalid address for tvm chain '{}': {}", cfg.name, e)
                        })?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Reads the private key named by a chain's `private_key_env`.
///
/// A missing key is fatal: callers surface this error at startup.
pub fn read_private_key(private_key_env: &str) -> anyhow::Result<String> {
    std::env::var(private_key_env).map_err(|_| {
        anyhow::anyhow!(
            "Environment variable '{}' not set. Please set it with the hex-encoded private key.",
            private_key_env
        )
    })
}
