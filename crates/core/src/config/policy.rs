//! Liquidation policy: which pair to liquidate and how much.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default share of the collateral balance to liquidate.
pub const DEFAULT_COLLATERAL_FRACTION: Decimal = dec!(0.5);

/// Validated policy handed to the decision engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationPolicy {
    /// Account that executes the liquidation
    pub liquidator: Address,
    /// Reserve to repay
    pub debt_asset: Address,
    /// Reserve whose balance triggers and sizes the liquidation
    pub collateral_asset: Address,
    /// Share of the collateral balance to liquidate, in (0, 1]
    #[serde(with = "rust_decimal::serde::str")]
    pub collateral_fraction: Decimal,
    /// Passed to the pool as `receiveAToken`
    pub receive_collateral_as_token: bool,
}

impl LiquidationPolicy {
    pub fn new(
        liquidator: Address,
        debt_asset: Address,
        collateral_asset: Address,
        collateral_fraction: Decimal,
        receive_collateral_as_token: bool,
    ) -> Result<Self> {
        if collateral_fraction <= Decimal::ZERO || collateral_fraction > Decimal::ONE {
            return Err(Error::Config(format!(
                "collateral_fraction must be in (0, 1], got {collateral_fraction}"
            )));
        }

        Ok(Self {
            liquidator,
            debt_asset,
            collateral_asset,
            collateral_fraction,
            receive_collateral_as_token,
        })
    }

    /// Log the policy.
    pub fn log_policy(&self) {
        tracing::info!(
            liquidator = %self.liquidator,
            debt_asset = %self.debt_asset,
            collateral_asset = %self.collateral_asset,
            collateral_fraction = %self.collateral_fraction,
            receive_collateral_as_token = self.receive_collateral_as_token,
            "Liquidation policy"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_bounds() {
        let a = Address::ZERO;
        assert!(LiquidationPolicy::new(a, a, a, dec!(0.5), false).is_ok());
        assert!(LiquidationPolicy::new(a, a, a, dec!(1), false).is_ok());
        assert!(LiquidationPolicy::new(a, a, a, dec!(0), false).is_err());
        assert!(LiquidationPolicy::new(a, a, a, dec!(-0.5), false).is_err());
        assert!(LiquidationPolicy::new(a, a, a, dec!(1.01), false).is_err());
    }
}
