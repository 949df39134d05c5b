//! Reserve state: configuration bitmap decoding and index normalization.

use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use liquidator_core::math;
use liquidator_core::{Error, Result};
use tracing::debug;

use crate::bindings::{IPool, ReserveDataLegacy};
use crate::rpc_url;

const LTV_SHIFT: usize = 0;
const LIQUIDATION_THRESHOLD_SHIFT: usize = 16;
const LIQUIDATION_BONUS_SHIFT: usize = 32;
const DECIMALS_SHIFT: usize = 48;
const ACTIVE_BIT: usize = 56;
const FROZEN_BIT: usize = 57;
const PAUSED_BIT: usize = 60;

/// Packed reserve configuration word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReserveConfiguration(pub U256);

impl ReserveConfiguration {
    #[inline]
    fn bits(&self, shift: usize, width: usize) -> u64 {
        let mask = U256::from((1u64 << width) - 1);
        ((self.0 >> shift) & mask).to::<u64>()
    }

    #[inline]
    fn flag(&self, bit: usize) -> bool {
        self.bits(bit, 1) == 1
    }

    /// Loan-to-value in basis points
    pub fn ltv(&self) -> u16 {
        self.bits(LTV_SHIFT, 16) as u16
    }

    /// Liquidation threshold in basis points
    pub fn liquidation_threshold(&self) -> u16 {
        self.bits(LIQUIDATION_THRESHOLD_SHIFT, 16) as u16
    }

    /// Liquidation bonus in basis points (10500 = 5% bonus)
    pub fn liquidation_bonus(&self) -> u16 {
        self.bits(LIQUIDATION_BONUS_SHIFT, 16) as u16
    }

    pub fn decimals(&self) -> u8 {
        self.bits(DECIMALS_SHIFT, 8) as u8
    }

    pub fn is_active(&self) -> bool {
        self.flag(ACTIVE_BIT)
    }

    pub fn is_frozen(&self) -> bool {
        self.flag(FROZEN_BIT)
    }

    pub fn is_paused(&self) -> bool {
        self.flag(PAUSED_BIT)
    }
}

/// Reserve indexes and rates needed to turn scaled balances into underlying amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveSnapshot {
    pub asset: Address,
    pub configuration: ReserveConfiguration,
    pub liquidity_index: U256,
    pub liquidity_rate: U256,
    pub variable_borrow_index: U256,
    pub variable_borrow_rate: U256,
    pub last_update_timestamp: u64,
}

impl ReserveSnapshot {
    pub fn from_reserve_data(asset: Address, data: &ReserveDataLegacy) -> Self {
        Self {
            asset,
            configuration: ReserveConfiguration(data.configuration),
            liquidity_index: U256::from(data.liquidityIndex),
            liquidity_rate: U256::from(data.currentLiquidityRate),
            variable_borrow_index: U256::from(data.variableBorrowIndex),
            variable_borrow_rate: U256::from(data.currentVariableBorrowRate),
            last_update_timestamp: data.lastUpdateTimestamp.to::<u64>(),
        }
    }

    pub fn decimals(&self) -> u8 {
        self.configuration.decimals()
    }

    /// The pool refuses `liquidationCall` against inactive or paused reserves.
    pub fn ensure_liquidatable(&self) -> Result<()> {
        if !self.configuration.is_active() {
            return Err(Error::SubmissionRejected(format!("reserve {} is not active", self.asset)));
        }
        if self.configuration.is_paused() {
            return Err(Error::SubmissionRejected(format!("reserve {} is paused", self.asset)));
        }
        Ok(())
    }

    /// Underlying supplied amount for a scaled aToken balance at `now`.
    pub fn supplied(&self, scaled_balance: U256, now: u64) -> U256 {
        let index = math::normalized_income(
            self.liquidity_index,
            self.liquidity_rate,
            self.last_update_timestamp,
            now,
        );
        math::scaled_to_underlying(scaled_balance, index)
    }

    /// Underlying variable debt for a scaled debt balance at `now`.
    pub fn borrowed(&self, scaled_debt: U256, now: u64) -> U256 {
        let index = math::normalized_variable_debt(
            self.variable_borrow_index,
            self.variable_borrow_rate,
            self.last_update_timestamp,
            now,
        );
        math::scaled_to_underlying(scaled_debt, index)
    }
}

/// Reads reserve state from the pool.
#[derive(Debug, Clone)]
pub struct ReserveReader {
    rpc_url: String,
    pool: Address,
}

impl ReserveReader {
    pub fn new(rpc_url: impl Into<String>, pool: Address) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            pool,
        }
    }

    pub async fn fetch(&self, asset: Address) -> Result<ReserveSnapshot> {
        let provider = ProviderBuilder::new().on_http(rpc_url(&self.rpc_url)?);
        let pool = IPool::new(self.pool, &provider);

        let data = pool
            .getReserveData(asset)
            .call()
            .await
            .map_err(|e| Error::DataUnavailable(format!("getReserveData({asset}): {e}")))?
            ._0;

        let reserve = ReserveSnapshot::from_reserve_data(asset, &data);
        debug!(
            asset = %asset,
            decimals = reserve.decimals(),
            ltv = reserve.configuration.ltv(),
            liquidation_threshold = reserve.configuration.liquidation_threshold(),
            liquidation_bonus = reserve.configuration.liquidation_bonus(),
            active = reserve.configuration.is_active(),
            frozen = reserve.configuration.is_frozen(),
            paused = reserve.configuration.is_paused(),
            "Fetched reserve data"
        );
        Ok(reserve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

    fn weth_configuration() -> U256 {
        U256::from(8050u64)
            | (U256::from(8300u64) << LIQUIDATION_THRESHOLD_SHIFT)
            | (U256::from(10500u64) << LIQUIDATION_BONUS_SHIFT)
            | (U256::from(18u64) << DECIMALS_SHIFT)
            | (U256::from(1u64) << ACTIVE_BIT)
            // borrowing enabled
            | (U256::from(1u64) << 58)
    }

    fn snapshot(rate: U256) -> ReserveSnapshot {
        ReserveSnapshot {
            asset: WETH,
            configuration: ReserveConfiguration(weth_configuration()),
            liquidity_index: math::RAY,
            liquidity_rate: rate,
            variable_borrow_index: math::RAY,
            variable_borrow_rate: rate,
            last_update_timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_configuration_decode() {
        let config = ReserveConfiguration(weth_configuration());
        assert_eq!(config.ltv(), 8050);
        assert_eq!(config.liquidation_threshold(), 8300);
        assert_eq!(config.liquidation_bonus(), 10500);
        assert_eq!(config.decimals(), 18);
        assert!(config.is_active());
        assert!(!config.is_frozen());
        assert!(!config.is_paused());
    }

    #[test]
    fn test_configuration_flags_independent() {
        let word = (U256::from(6u64) << DECIMALS_SHIFT)
            | (U256::from(1u64) << FROZEN_BIT)
            | (U256::from(1u64) << PAUSED_BIT);
        let config = ReserveConfiguration(word);
        assert_eq!(config.decimals(), 6);
        assert_eq!(config.ltv(), 0);
        assert!(!config.is_active());
        assert!(config.is_frozen());
        assert!(config.is_paused());
    }

    #[test]
    fn test_high_bits_ignored() {
        // Supply cap and other fields above bit 63 must not leak into decimals
        let word = weth_configuration() | (U256::from(u64::MAX) << 116);
        assert_eq!(ReserveConfiguration(word).decimals(), 18);
    }

    #[test]
    fn test_liquidatable_requires_active_unpaused_reserve() {
        let mut reserve = snapshot(U256::ZERO);
        assert!(reserve.ensure_liquidatable().is_ok());

        // Frozen reserves still accept liquidations
        reserve.configuration = ReserveConfiguration(weth_configuration() | (U256::from(1u64) << FROZEN_BIT));
        assert!(reserve.ensure_liquidatable().is_ok());

        reserve.configuration = ReserveConfiguration(weth_configuration() | (U256::from(1u64) << PAUSED_BIT));
        assert!(matches!(
            reserve.ensure_liquidatable(),
            Err(Error::SubmissionRejected(msg)) if msg.contains("paused")
        ));

        reserve.configuration = ReserveConfiguration(weth_configuration() & !(U256::from(1u64) << ACTIVE_BIT));
        assert!(matches!(
            reserve.ensure_liquidatable(),
            Err(Error::SubmissionRejected(msg)) if msg.contains("not active")
        ));
    }

    #[test]
    fn test_unit_index_no_elapsed_time() {
        let reserve = snapshot(U256::ZERO);
        let scaled = U256::from(2_500_000_000_000_000_000u128);
        assert_eq!(reserve.supplied(scaled, reserve.last_update_timestamp), scaled);
        assert_eq!(reserve.borrowed(scaled, reserve.last_update_timestamp), scaled);
    }

    #[test]
    fn test_interest_accrues_after_update() {
        // 10% in RAY
        let rate = math::RAY / U256::from(10u64);
        let reserve = snapshot(rate);
        let scaled = U256::from(1_000_000_000_000_000_000u128);
        let later = reserve.last_update_timestamp + math::SECONDS_PER_YEAR;

        let supplied = reserve.supplied(scaled, later);
        let borrowed = reserve.borrowed(scaled, later);

        // Linear supply interest: exactly 1.1
        assert_eq!(supplied, U256::from(1_100_000_000_000_000_000u128));
        // Compounded debt grows faster than linear
        assert!(borrowed > supplied);
    }

    #[test]
    fn test_from_reserve_data() {
        let data = ReserveDataLegacy {
            configuration: weth_configuration(),
            liquidityIndex: 1_050_000_000_000_000_000_000_000_000u128,
            currentLiquidityRate: 0,
            variableBorrowIndex: 1_100_000_000_000_000_000_000_000_000u128,
            currentVariableBorrowRate: 0,
            currentStableBorrowRate: 0,
            lastUpdateTimestamp: alloy::primitives::aliases::U40::from(1_700_000_000u64),
            id: 0,
            aTokenAddress: Address::ZERO,
            stableDebtTokenAddress: Address::ZERO,
            variableDebtTokenAddress: Address::ZERO,
            interestRateStrategyAddress: Address::ZERO,
            accruedToTreasury: 0,
            unbacked: 0,
            isolationModeTotalDebt: 0,
        };

        let reserve = ReserveSnapshot::from_reserve_data(WETH, &data);
        assert_eq!(reserve.decimals(), 18);
        assert_eq!(reserve.last_update_timestamp, 1_700_000_000);

        let scaled = U256::from(2_000_000_000_000_000_000u128);
        assert_eq!(
            reserve.supplied(scaled, reserve.last_update_timestamp),
            U256::from(2_100_000_000_000_000_000u128)
        );
        assert_eq!(
            reserve.borrowed(scaled, reserve.last_update_timestamp),
            U256::from(2_200_000_000_000_000_000u128)
        );
    }
}
