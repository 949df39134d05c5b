//! Snapshot data structures for one account's lending positions.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::math;

/// Collateralization ratio of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthFactor {
    /// Finite ratio; below 1.0 the account can be liquidated
    Ratio(Decimal),
    /// Account has no debt, the pool reports `type(uint256).max`
    NoDebt,
}

impl HealthFactor {
    /// Decode the pool's WAD-encoded health factor.
    ///
    /// Finite values too large for `Decimal` saturate to `Decimal::MAX`,
    /// which keeps them on the safe side of the threshold.
    pub fn from_wad(raw: U256) -> Self {
        if raw == U256::MAX {
            return Self::NoDebt;
        }
        match math::to_decimal(raw, math::HEALTH_FACTOR_DECIMALS) {
            Ok(value) => Self::Ratio(value),
            Err(_) => Self::Ratio(Decimal::MAX),
        }
    }

    /// Check if the account is undercollateralized (HF < 1.0).
    pub fn is_liquidatable(&self) -> bool {
        match self {
            Self::Ratio(value) => *value < Decimal::ONE,
            Self::NoDebt => false,
        }
    }
}

impl fmt::Display for HealthFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ratio(value) => write!(f, "{}", value.round_dp(4)),
            Self::NoDebt => f.write_str("inf"),
        }
    }
}

/// One reserve held by a user, in the asset's own decimal units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPosition {
    /// Reserve (underlying token) address
    pub underlying_asset: Address,
    /// Supplied balance, interest included
    pub underlying_balance: Decimal,
    /// Variable debt balance, interest included
    #[serde(default)]
    pub variable_debt: Decimal,
    /// Token decimals
    pub decimals: u32,
    /// Whether the supplied balance counts as collateral
    #[serde(default = "default_true")]
    pub usage_as_collateral_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl AssetPosition {
    /// Supplied-only position used as collateral.
    pub fn collateral(underlying_asset: Address, underlying_balance: Decimal, decimals: u32) -> Self {
        Self {
            underlying_asset,
            underlying_balance,
            variable_debt: Decimal::ZERO,
            decimals,
            usage_as_collateral_enabled: true,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.underlying_balance.is_sign_negative() && !self.underlying_balance.is_zero() {
            return Err(Error::Malformed(format!(
                "negative balance {} for {}",
                self.underlying_balance, self.underlying_asset
            )));
        }
        if self.variable_debt.is_sign_negative() && !self.variable_debt.is_zero() {
            return Err(Error::Malformed(format!(
                "negative debt {} for {}",
                self.variable_debt, self.underlying_asset
            )));
        }
        Ok(())
    }
}

/// Snapshot of one account at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPositionSummary {
    /// Account address
    pub user: Address,
    /// Health factor as reported by the pool
    pub health_factor: HealthFactor,
    /// Positions in the order the data provider returned them
    pub reserve_positions: Vec<AssetPosition>,
    /// Total collateral in the market base currency
    #[serde(default)]
    pub total_collateral_base: Decimal,
    /// Total debt in the market base currency
    #[serde(default)]
    pub total_debt_base: Decimal,
    /// Unix timestamp the indexes were normalized at
    #[serde(default)]
    pub fetched_at: u64,
}

impl UserPositionSummary {
    /// Create a snapshot without base-currency totals.
    pub fn new(user: Address, health_factor: HealthFactor, reserve_positions: Vec<AssetPosition>) -> Self {
        Self {
            user,
            health_factor,
            reserve_positions,
            total_collateral_base: Decimal::ZERO,
            total_debt_base: Decimal::ZERO,
            fetched_at: 0,
        }
    }

    /// Check the data-model invariants.
    pub fn validate(&self) -> Result<()> {
        if let HealthFactor::Ratio(value) = self.health_factor {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(Error::Malformed(format!("negative health factor {value}")));
            }
        }
        self.reserve_positions.iter().try_for_each(AssetPosition::validate)
    }

    /// First position for `asset`, in sequence order.
    pub fn position(&self, asset: Address) -> Option<&AssetPosition> {
        self.reserve_positions
            .iter()
            .find(|p| p.underlying_asset == asset)
    }

    /// Check if position is liquidatable (HF < 1.0).
    pub fn is_liquidatable(&self) -> bool {
        self.health_factor.is_liquidatable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use rust_decimal_macros::dec;

    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

    #[test]
    fn test_health_factor_from_wad() {
        assert_eq!(HealthFactor::from_wad(U256::MAX), HealthFactor::NoDebt);

        let hf = HealthFactor::from_wad(U256::from(950_000_000_000_000_000u128));
        assert_eq!(hf, HealthFactor::Ratio(dec!(0.95)));
        assert!(hf.is_liquidatable());

        // Dust debt gives a huge but finite ratio
        let huge = HealthFactor::from_wad(U256::MAX - U256::from(1u64));
        assert_eq!(huge, HealthFactor::Ratio(Decimal::MAX));
        assert!(!huge.is_liquidatable());
    }

    #[test]
    fn test_liquidation_boundary() {
        assert!(!HealthFactor::Ratio(dec!(1.0)).is_liquidatable());
        assert!(HealthFactor::Ratio(dec!(0.9999)).is_liquidatable());
        assert!(!HealthFactor::NoDebt.is_liquidatable());
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let summary = UserPositionSummary::new(
            Address::ZERO,
            HealthFactor::Ratio(dec!(0.9)),
            vec![AssetPosition::collateral(WETH, dec!(-1), 18)],
        );
        assert!(matches!(summary.validate(), Err(Error::Malformed(_))));

        let summary = UserPositionSummary::new(Address::ZERO, HealthFactor::Ratio(dec!(-0.1)), vec![]);
        assert!(matches!(summary.validate(), Err(Error::Malformed(_))));
    }

    #[test]
    fn test_position_lookup_returns_first_match() {
        let summary = UserPositionSummary::new(
            Address::ZERO,
            HealthFactor::Ratio(dec!(0.9)),
            vec![
                AssetPosition::collateral(WETH, dec!(2), 18),
                AssetPosition::collateral(WETH, dec!(5), 18),
            ],
        );
        assert_eq!(summary.position(WETH).unwrap().underlying_balance, dec!(2));
        assert!(summary.position(Address::ZERO).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(HealthFactor::NoDebt.to_string(), "inf");
        assert_eq!(HealthFactor::Ratio(dec!(0.951234)).to_string(), "0.9512");
    }
}
