//! File-backed liquidator configuration.
//!
//! Every section except `[policy]` has defaults, so a minimal file only names
//! the liquidator account, the asset pair and the users to watch.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::policy::DEFAULT_COLLATERAL_FRACTION;
use crate::error::{Error, Result};

/// Default config file location (relative to the working directory).
pub const DEFAULT_CONFIG_PATH: &str = "./config/liquidator.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidatorConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// RPC endpoint and chain
    #[serde(default)]
    pub network: NetworkConfig,

    /// Protocol contract addresses
    #[serde(default)]
    pub contracts: ContractsConfig,

    /// Liquidation pair and sizing
    pub policy: PolicyConfig,

    /// Polling behavior
    #[serde(default)]
    pub scanner: ScannerConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// RPC endpoint and chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// HTTP RPC URL (`${VAR}` expands from the environment)
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Chain ID
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

fn default_rpc_url() -> String {
    "https://eth-mainnet.public.blastapi.io".to_string()
}
fn default_chain_id() -> u64 {
    1
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
        }
    }
}

/// Protocol contract addresses (hex strings or `${VAR}`).
///
/// Defaults point at the Aave V3 Ethereum market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Pool (liquidationCall, getUserAccountData, getReserveData)
    #[serde(default = "default_pool")]
    pub pool: String,

    /// PoolAddressesProvider, passed to the UI data provider
    #[serde(default = "default_pool_addresses_provider")]
    pub pool_addresses_provider: String,

    /// UiPoolDataProvider view contract
    #[serde(default = "default_ui_pool_data_provider")]
    pub ui_pool_data_provider: String,
}

fn default_pool() -> String {
    "0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2".to_string()
}
fn default_pool_addresses_provider() -> String {
    "0x2f39d218133AFaB8F2B819B1066c7E434Ad94E9e".to_string()
}
fn default_ui_pool_data_provider() -> String {
    "0x3F78BBD206e4D3c504Eb854232EdA7e47E9Fd8FC".to_string()
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            pool: default_pool(),
            pool_addresses_provider: default_pool_addresses_provider(),
            ui_pool_data_provider: default_ui_pool_data_provider(),
        }
    }
}

/// Liquidation pair and sizing, before address parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Account executing liquidations (must match the signer)
    pub liquidator: String,

    /// Reserve to repay
    pub debt_asset: String,

    /// Reserve to seize
    pub collateral_asset: String,

    /// Share of the collateral balance to liquidate
    #[serde(
        default = "default_collateral_fraction",
        with = "rust_decimal::serde::str"
    )]
    pub collateral_fraction: Decimal,

    /// Receive aTokens instead of the underlying
    #[serde(default)]
    pub receive_collateral_as_token: bool,
}

fn default_collateral_fraction() -> Decimal {
    DEFAULT_COLLATERAL_FRACTION
}

/// How the scanner runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Single fetch/evaluate/submit pass, then exit
    Once,
    /// Repeat on a fixed interval
    Poll,
}

/// Scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Accounts to watch (hex strings or `${VAR}`)
    #[serde(default)]
    pub users: Vec<String>,

    /// Poll interval (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Maximum concurrent snapshot fetches per cycle
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_fetches: usize,

    /// Log requests instead of submitting them
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,

    /// Once or poll
    #[serde(default = "default_mode")]
    pub mode: ScanMode,
}

fn default_poll_interval() -> u64 {
    12_000
}
fn default_max_concurrent() -> usize {
    4
}
fn default_dry_run() -> bool {
    true
}
fn default_mode() -> ScanMode {
    ScanMode::Once
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            poll_interval_ms: default_poll_interval(),
            max_concurrent_fetches: default_max_concurrent(),
            dry_run: default_dry_run(),
            mode: default_mode(),
        }
    }
}

impl ScannerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl LiquidatorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from `CONFIG_PATH`, or the default location.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(path)
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Liquidator configuration loaded");
        tracing::info!(
            chain_id = self.network.chain_id,
            pool = %self.contracts.pool,
            ui_pool_data_provider = %self.contracts.ui_pool_data_provider,
            "Network and contracts"
        );
        tracing::info!(
            users = self.scanner.users.len(),
            poll_interval_ms = self.scanner.poll_interval_ms,
            dry_run = self.scanner.dry_run,
            mode = ?self.scanner.mode,
            "Scanner settings"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MINIMAL: &str = r#"
        [policy]
        liquidator = "0x5853eD4f26A3fceA565b3FBC698bb19cdF6DEB85"
        debt_asset = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
        collateral_asset = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
    "#;

    #[test]
    fn test_defaults() {
        let config = LiquidatorConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.profile, "default");
        assert_eq!(config.network.chain_id, 1);
        assert_eq!(config.policy.collateral_fraction, dec!(0.5));
        assert!(!config.policy.receive_collateral_as_token);
        assert!(config.scanner.dry_run);
        assert_eq!(config.scanner.mode, ScanMode::Once);
        assert_eq!(config.scanner.poll_interval(), Duration::from_secs(12));
    }

    #[test]
    fn test_full_file() {
        let toml_str = r#"
            profile = "mainnet"

            [network]
            rpc_url = "${RPC_URL}"
            chain_id = 1

            [policy]
            liquidator = "0x5853eD4f26A3fceA565b3FBC698bb19cdF6DEB85"
            debt_asset = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
            collateral_asset = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
            collateral_fraction = "0.25"
            receive_collateral_as_token = true

            [scanner]
            users = ["0x95af7FfFE0e7d40956D77bF3f55156D4483b4693"]
            poll_interval_ms = 2000
            dry_run = false
            mode = "poll"
        "#;

        let config = LiquidatorConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.profile, "mainnet");
        assert_eq!(config.network.rpc_url, "${RPC_URL}");
        assert_eq!(config.policy.collateral_fraction, dec!(0.25));
        assert!(config.policy.receive_collateral_as_token);
        assert_eq!(config.scanner.users.len(), 1);
        assert_eq!(config.scanner.mode, ScanMode::Poll);
        assert!(!config.scanner.dry_run);
    }

    #[test]
    fn test_shipped_config_resolves() {
        let content = include_str!("../../../../config/liquidator.toml");
        let config = LiquidatorConfig::from_toml(content).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.scanner.users.len(), 1);
        assert!(resolved.scanner.dry_run);
        assert_eq!(resolved.policy.collateral_fraction, dec!(0.5));
    }

    #[test]
    fn test_missing_policy_is_an_error() {
        assert!(matches!(
            LiquidatorConfig::from_toml("profile = \"x\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_serialization() {
        let config = LiquidatorConfig::from_toml(MINIMAL).unwrap();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("collateral_fraction = \"0.5\""));

        let parsed = LiquidatorConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.policy.debt_asset, config.policy.debt_asset);
    }
}
