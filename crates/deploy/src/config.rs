//! Deployment configuration.
//!
//! The network endpoint, the sending account and the contract identifiers are
//! an explicit value handed to the orchestrator. Values are layered: built-in
//! defaults, then `Ledgerlink.toml`, then `LEDGERLINK_*` environment variables
//! (nested keys use `__`, e.g. `LEDGERLINK_CHAIN__CONFIRMATIONS=2`).

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ContractId;

/// The default name for the configuration file.
pub const LEDGERLINK_CONFIG_FILENAME: &str = "Ledgerlink.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LEDGERLINK_";

/// Default JSON-RPC endpoint (a local Hardhat or Anvil node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545/";

/// Default artifact identifier of the storage contract.
pub const DEFAULT_VAULT_CONTRACT: &str = "TL_Evidence_Vault";
/// Default artifact identifier of the logic contract.
pub const DEFAULT_CORE_CONTRACT: &str = "TL_Ledger_Core";
/// Default administrative method that authorizes the core on the vault.
pub const DEFAULT_LINK_METHOD: &str = "setLedgerCore";

/// Connection settings for the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the node.
    pub rpc_url: Url,
    /// Sending account. Must be unlocked on the node. Defaults to the node's
    /// first account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Expected chain ID. When set, connecting to a node on another chain fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Number of blocks (including the inclusion block) a transaction must be
    /// buried under to count as confirmed.
    pub confirmations: u64,
    /// Interval between receipt polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// How long to wait for a transaction to confirm, in seconds.
    pub confirmation_timeout_secs: u64,
    /// Timeout of a single RPC request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is valid"),
            from: None,
            chain_id: None,
            confirmations: 1,
            poll_interval_ms: 500,
            confirmation_timeout_secs: 120,
            request_timeout_secs: 10,
        }
    }
}

impl ChainConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The contracts to deploy and how to link them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Directory holding compiled contract artifacts (Hardhat `artifacts/` or
    /// Foundry `out/`).
    pub artifacts_dir: PathBuf,
    /// Storage contract identifier.
    pub vault: ContractId,
    /// Logic contract identifier. Its constructor takes the vault address.
    pub core: ContractId,
    /// Vault method taking the core address that authorizes it as writer.
    pub link_method: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            vault: ContractId::from(DEFAULT_VAULT_CONTRACT),
            core: ContractId::from(DEFAULT_CORE_CONTRACT),
            link_method: DEFAULT_LINK_METHOD.to_string(),
        }
    }
}

/// Complete configuration of a deployment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub chain: ChainConfig,
    pub contracts: ContractsConfig,
}

impl DeployConfig {
    /// Load the layered configuration.
    ///
    /// If `path` is `None`, `Ledgerlink.toml` in the current directory is used
    /// when present. An explicit path must exist; a directory is resolved to the
    /// config file inside it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Configuration file or directory not found: {}", path.display());
                }
                if path.is_dir() {
                    path.join(LEDGERLINK_CONFIG_FILENAME)
                } else {
                    path.to_path_buf()
                }
            }
            None => PathBuf::from(LEDGERLINK_CONFIG_FILENAME),
        };

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| {
                format!("Failed to load configuration from {}", config_path.display())
            })?;

        config.validate()?;

        tracing::debug!(
            path = %config_path.display(),
            rpc_url = %config.chain.rpc_url,
            vault = %config.contracts.vault,
            core = %config.contracts.core,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Check values that would make a run fail in a confusing way later on.
    pub fn validate(&self) -> Result<()> {
        if self.chain.confirmations == 0 {
            anyhow::bail!("chain.confirmations must be at least 1");
        }
        if self.chain.poll_interval_ms == 0 {
            anyhow::bail!("chain.poll_interval_ms must be greater than 0");
        }
        if self.chain.confirmation_timeout_secs == 0 {
            anyhow::bail!("chain.confirmation_timeout_secs must be greater than 0");
        }
        if self.contracts.vault.is_empty() || self.contracts.core.is_empty() {
            anyhow::bail!("contracts.vault and contracts.core must not be empty");
        }
        if self.contracts.vault == self.contracts.core {
            anyhow::bail!(
                "contracts.vault and contracts.core must differ, both are {}",
                self.contracts.vault
            );
        }
        if !is_identifier(&self.contracts.link_method) {
            anyhow::bail!(
                "contracts.link_method is not a valid method name: '{}'",
                self.contracts.link_method
            );
        }
        Ok(())
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

/// Solidity identifier: letters, digits, `_` and `$`, not starting with a digit.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
