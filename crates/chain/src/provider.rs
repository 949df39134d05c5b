//! Position snapshots from the Aave V3 pool and UI data provider.
//!
//! One fetch issues the account-data and user-reserves reads concurrently,
//! then one `getReserveData` per reserve the user touches. Scaled balances are
//! normalized to underlying amounts at the local wall-clock time.

use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use liquidator_core::config::ResolvedConfig;
use liquidator_core::math;
use liquidator_core::{
    AssetPosition, Error, HealthFactor, PositionSnapshotProvider, Result, UserPositionSummary,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::bindings::{IPool, IUiPoolDataProviderV3, UserReserveData};
use crate::reserve::{ReserveReader, ReserveSnapshot};
use crate::rpc_url;

/// Base-currency amounts (USD) carry 8 decimals.
const BASE_CURRENCY_DECIMALS: u8 = 8;

/// Concurrent `getReserveData` reads per snapshot.
const RESERVE_FETCH_CONCURRENCY: usize = 8;

/// Reads user positions over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct AaveSnapshotProvider {
    rpc_url: String,
    pool: Address,
    pool_addresses_provider: Address,
    ui_pool_data_provider: Address,
    reserves: ReserveReader,
}

impl AaveSnapshotProvider {
    pub fn new(
        rpc_url: impl Into<String>,
        pool: Address,
        pool_addresses_provider: Address,
        ui_pool_data_provider: Address,
    ) -> Self {
        let rpc_url = rpc_url.into();
        Self {
            reserves: ReserveReader::new(rpc_url.clone(), pool),
            rpc_url,
            pool,
            pool_addresses_provider,
            ui_pool_data_provider,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        let provider = Self::new(
            config.rpc_url.clone(),
            config.contracts.pool,
            config.contracts.pool_addresses_provider,
            config.contracts.ui_pool_data_provider,
        );
        info!(
            pool = %provider.pool,
            ui_pool_data_provider = %provider.ui_pool_data_provider,
            "Snapshot provider initialized"
        );
        provider
    }

    async fn read(&self, user: Address) -> Result<(IPool::getUserAccountDataReturn, Vec<UserReserveData>)> {
        let provider = ProviderBuilder::new().on_http(rpc_url(&self.rpc_url)?);
        let pool = IPool::new(self.pool, &provider);
        let ui = IUiPoolDataProviderV3::new(self.ui_pool_data_provider, &provider);

        let account_call = pool.getUserAccountData(user);
        let reserves_call = ui.getUserReservesData(self.pool_addresses_provider, user);

        let (account, reserves) = tokio::join!(account_call.call(), reserves_call.call());

        let account = account
            .map_err(|e| Error::DataUnavailable(format!("getUserAccountData({user}): {e}")))?;
        let reserves = reserves
            .map_err(|e| Error::DataUnavailable(format!("getUserReservesData({user}): {e}")))?
            ._0;

        Ok((account, reserves))
    }
}

#[async_trait]
impl PositionSnapshotProvider for AaveSnapshotProvider {
    async fn fetch(&self, user: Address) -> Result<UserPositionSummary> {
        let (account, entries) = self.read(user).await?;

        let touched: Vec<UserReserveData> = entries
            .into_iter()
            .filter(|entry| !entry.scaledATokenBalance.is_zero() || !entry.scaledVariableDebt.is_zero())
            .collect();

        let assets: Vec<Address> = touched.iter().map(|entry| entry.underlyingAsset).collect();
        let reserves: Vec<ReserveSnapshot> = stream::iter(assets)
            .map(|asset| {
                let reader = self.reserves.clone();
                async move { reader.fetch(asset).await }
            })
            .buffered(RESERVE_FETCH_CONCURRENCY)
            .try_collect()
            .await?;

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let summary = build_summary(user, &account, &touched, &reserves, now)?;

        debug!(
            user = %user,
            health_factor = %summary.health_factor,
            positions = summary.reserve_positions.len(),
            total_collateral_base = %summary.total_collateral_base,
            total_debt_base = %summary.total_debt_base,
            fetched_at = summary.fetched_at,
            "Fetched position snapshot"
        );
        Ok(summary)
    }
}

/// Assemble a snapshot from raw contract results. `reserves` is index-aligned with `entries`.
pub fn build_summary(
    user: Address,
    account: &IPool::getUserAccountDataReturn,
    entries: &[UserReserveData],
    reserves: &[ReserveSnapshot],
    now: u64,
) -> Result<UserPositionSummary> {
    if entries.len() != reserves.len() {
        return Err(Error::Malformed(format!(
            "{} reserve entries but {} reserve states",
            entries.len(),
            reserves.len()
        )));
    }

    let positions = entries
        .iter()
        .zip(reserves)
        .map(|(entry, reserve)| position(entry, reserve, now))
        .collect::<Result<Vec<_>>>()?;

    let summary = UserPositionSummary {
        user,
        health_factor: HealthFactor::from_wad(account.healthFactor),
        reserve_positions: positions,
        total_collateral_base: math::to_decimal(account.totalCollateralBase, BASE_CURRENCY_DECIMALS)?,
        total_debt_base: math::to_decimal(account.totalDebtBase, BASE_CURRENCY_DECIMALS)?,
        fetched_at: now,
    };
    summary.validate()?;
    Ok(summary)
}

fn position(entry: &UserReserveData, reserve: &ReserveSnapshot, now: u64) -> Result<AssetPosition> {
    let decimals = reserve.decimals();
    let supplied = reserve.supplied(entry.scaledATokenBalance, now);
    let borrowed = reserve.borrowed(entry.scaledVariableDebt, now);

    Ok(AssetPosition {
        underlying_asset: entry.underlyingAsset,
        underlying_balance: to_amount(supplied, decimals)?,
        variable_debt: to_amount(borrowed, decimals)?,
        decimals: u32::from(decimals),
        usage_as_collateral_enabled: entry.usageAsCollateralEnabledOnUser,
    })
}

#[inline]
fn to_amount(raw: U256, decimals: u8) -> Result<Decimal> {
    if raw.is_zero() {
        return Ok(Decimal::ZERO);
    }
    math::to_decimal(raw, decimals)
}
