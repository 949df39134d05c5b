//! Configuration system.
//!
//! - File configuration (TOML, per-field defaults)
//! - Liquidation policy (validated pair and sizing)
//! - Resolution of `${VAR}` references and addresses into runtime settings

mod liquidator;
mod loader;
mod policy;

pub use liquidator::{
    ContractsConfig, LiquidatorConfig, NetworkConfig, PolicyConfig, ScanMode, ScannerConfig,
    DEFAULT_CONFIG_PATH,
};
pub use loader::{expand_env, parse_address, ResolvedConfig, ResolvedContracts, ScannerSettings};
pub use policy::{LiquidationPolicy, DEFAULT_COLLATERAL_FRACTION};
