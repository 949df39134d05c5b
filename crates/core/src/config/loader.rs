//! Resolves the file configuration into typed runtime settings.
//!
//! `${VAR}` references in string values are read from the environment, so
//! account addresses and RPC keys can stay out of the config file.

use alloy::primitives::Address;
use regex_lite::Regex;
use std::time::Duration;
use tracing::info;

use super::liquidator::{LiquidatorConfig, ScanMode};
use super::policy::LiquidationPolicy;
use crate::error::{Error, Result};

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Profile name
    pub profile: String,
    /// RPC URL with env vars expanded
    pub rpc_url: String,
    /// Chain ID
    pub chain_id: u64,
    /// Contract addresses
    pub contracts: ResolvedContracts,
    /// Validated liquidation policy
    pub policy: LiquidationPolicy,
    /// Scanner settings
    pub scanner: ScannerSettings,
}

/// Resolved contract addresses.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedContracts {
    pub pool: Address,
    pub pool_addresses_provider: Address,
    pub ui_pool_data_provider: Address,
}

/// Resolved scanner settings.
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub users: Vec<Address>,
    pub poll_interval: Duration,
    pub max_concurrent_fetches: usize,
    pub dry_run: bool,
    pub mode: ScanMode,
}

/// `${VAR_NAME}` references, anywhere in a value.
const ENV_REFERENCE: &str = r"\$\{([^}]+)\}";

/// Expand every `${VAR}` reference in `value`. A referenced variable that is
/// unset is an error; strings without references are returned unchanged.
pub fn expand_env(value: &str) -> Result<String> {
    let pattern = Regex::new(ENV_REFERENCE).map_err(|e| Error::Config(e.to_string()))?;

    let mut expanded = String::with_capacity(value.len());
    let mut last = 0;
    for caps in pattern.captures_iter(value) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let var = std::env::var(name.as_str())
            .map_err(|_| Error::Config(format!("Missing env var: {}", name.as_str())))?;
        expanded.push_str(&value[last..whole.start()]);
        expanded.push_str(&var);
        last = whole.end();
    }
    expanded.push_str(&value[last..]);

    Ok(expanded)
}

/// Parse an address, expanding `${VAR}` first.
pub fn parse_address(value: &str, field: &str) -> Result<Address> {
    let expanded = expand_env(value)?;
    expanded
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid address for {field} '{expanded}': {e}")))
}

impl LiquidatorConfig {
    /// Expand env references, parse addresses and validate the policy.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let contracts = ResolvedContracts {
            pool: parse_address(&self.contracts.pool, "contracts.pool")?,
            pool_addresses_provider: parse_address(
                &self.contracts.pool_addresses_provider,
                "contracts.pool_addresses_provider",
            )?,
            ui_pool_data_provider: parse_address(
                &self.contracts.ui_pool_data_provider,
                "contracts.ui_pool_data_provider",
            )?,
        };

        let policy = LiquidationPolicy::new(
            parse_address(&self.policy.liquidator, "policy.liquidator")?,
            parse_address(&self.policy.debt_asset, "policy.debt_asset")?,
            parse_address(&self.policy.collateral_asset, "policy.collateral_asset")?,
            self.policy.collateral_fraction,
            self.policy.receive_collateral_as_token,
        )?;

        let users = self
            .scanner
            .users
            .iter()
            .map(|u| parse_address(u, "scanner.users"))
            .collect::<Result<Vec<_>>>()?;

        if users.is_empty() {
            return Err(Error::Config("scanner.users is empty".to_string()));
        }
        if self.scanner.max_concurrent_fetches == 0 {
            return Err(Error::Config("scanner.max_concurrent_fetches must be > 0".to_string()));
        }

        info!(
            profile = %self.profile,
            users = users.len(),
            "Configuration resolved"
        );

        Ok(ResolvedConfig {
            profile: self.profile.clone(),
            rpc_url: expand_env(&self.network.rpc_url)?,
            chain_id: self.network.chain_id,
            contracts,
            policy,
            scanner: ScannerSettings {
                users,
                poll_interval: self.scanner.poll_interval(),
                max_concurrent_fetches: self.scanner.max_concurrent_fetches,
                dry_run: self.scanner.dry_run,
                mode: self.scanner.mode,
            },
        })
    }
}
