//! Aave V3 Liquidator
//!
//! Watches configured accounts on an Aave V3 market and liquidates those whose
//! health factor has dropped below 1, buying a fixed fraction of one
//! configured collateral asset against one configured debt asset.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_chain::{AaveSnapshotProvider, PoolLiquidationSubmitter, PRIVATE_KEY_ENV};
use liquidator_core::{
    Error, LiquidationDecisionEngine, LiquidationRequest, LiquidationSubmitter, LiquidatorConfig,
    ResolvedConfig, Scanner, TransactionHandle,
};

/// Environment variable names.
mod env {
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

const DEFAULT_LOG_FILTER: &str = "info,liquidator_core=debug,liquidator_chain=debug";

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    // CONFIG_PATH selects the file; defaults to ./config/liquidator.toml
    let config = LiquidatorConfig::from_env().context("failed to load configuration")?;
    config.log_config();
    let config = config.resolve().context("invalid configuration")?;
    config.policy.log_policy();

    info!("Starting Aave V3 Liquidator");
    info!(chain_id = config.chain_id, "Network");

    let scanner = initialize_components(&config).await?;

    scanner.run().await.context("scanner failed")?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(env::LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn initialize_components(config: &ResolvedConfig) -> Result<Scanner> {
    info!("Initializing components...");

    let provider = Arc::new(AaveSnapshotProvider::from_config(config));
    let submitter = initialize_submitter(config).await?;
    let engine = LiquidationDecisionEngine::new(config.policy.clone());

    info!(
        users = config.scanner.users.len(),
        mode = ?config.scanner.mode,
        dry_run = config.scanner.dry_run,
        "Scanner configured"
    );

    Ok(Scanner::new(provider, submitter, engine, config.scanner.clone()))
}

async fn initialize_submitter(config: &ResolvedConfig) -> Result<Arc<dyn LiquidationSubmitter>> {
    if config.scanner.dry_run && std::env::var(PRIVATE_KEY_ENV).is_err() {
        warn!("{PRIVATE_KEY_ENV} not set; dry run proceeds without a signer");
        return Ok(Arc::new(NoSigner));
    }

    let submitter = PoolLiquidationSubmitter::from_env(config)
        .await
        .context("failed to initialize signer")?;
    if submitter.address != config.policy.liquidator {
        warn!(
            signer = %submitter.address,
            liquidator = %config.policy.liquidator,
            "Signer does not match the configured liquidator; submissions will be rejected"
        );
    }
    Ok(Arc::new(submitter))
}

/// Stand-in used for dry runs without a key. Never reached by the scanner in dry-run mode.
struct NoSigner;

#[async_trait]
impl LiquidationSubmitter for NoSigner {
    async fn submit(&self, _request: &LiquidationRequest) -> liquidator_core::Result<TransactionHandle> {
        Err(Error::SubmissionRejected("no signer configured".to_string()))
    }
}

fn print_banner() {
    println!(r#"
    ╔═╗┌─┐┬  ┬┌─┐  ╦  ┬┌─┐ ┬ ┬┬┌┬┐┌─┐┌┬┐┌─┐┬─┐
    ╠═╣├─┤└┐┌┘├┤   ║  ││─┼┐│ ││ ││├─┤ │ │ │├┬┘
    ╩ ╩┴ ┴ └┘ └─┘  ╩═╝┴└─┘└└─┘┴─┴┘┴ ┴ ┴ └─┘┴└─
    Aave V3 Liquidator v0.1.0
    "#);
}
