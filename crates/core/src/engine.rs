//! Liquidation decision engine.
//!
//! Turns a position snapshot plus a fixed policy into an optional liquidation
//! request. No I/O happens here; fetching and submission belong to the
//! collaborators in [`crate::collaborators`].

use alloy::primitives::{Address, B256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LiquidationPolicy;
use crate::error::Result;
use crate::math;
use crate::position::UserPositionSummary;

/// Largest scale `Decimal` can carry.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Parameters for a single `liquidationCall`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationRequest {
    /// Account executing the liquidation
    pub liquidator: Address,
    /// Account being liquidated
    pub liquidated_user: Address,
    /// Reserve whose debt is repaid
    pub debt_asset: Address,
    /// Reserve whose collateral is seized
    pub collateral_asset: Address,
    /// Debt to repay, in debt-asset units
    #[serde(with = "rust_decimal::serde::str")]
    pub purchase_amount: Decimal,
    /// Receive the interest-bearing receipt token instead of the underlying
    pub receive_collateral_as_token: bool,
}

/// Handle of a transaction accepted by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHandle {
    pub tx_hash: B256,
}

/// Stateless decision engine for one debt/collateral pair.
#[derive(Debug, Clone)]
pub struct LiquidationDecisionEngine {
    policy: LiquidationPolicy,
}

impl LiquidationDecisionEngine {
    /// Create an engine for a validated policy.
    pub fn new(policy: LiquidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &LiquidationPolicy {
        &self.policy
    }

    /// Decide whether `summary` warrants a liquidation.
    ///
    /// Returns `Ok(None)` for healthy accounts and for accounts without
    /// seizable collateral in the configured reserve. Fails only when the
    /// snapshot itself is malformed.
    pub fn evaluate(
        &self,
        summary: &UserPositionSummary,
        liquidated_user: Address,
    ) -> Result<Option<LiquidationRequest>> {
        summary.validate()?;

        if !summary.health_factor.is_liquidatable() {
            return Ok(None);
        }

        let Some(position) = summary.position(self.policy.collateral_asset) else {
            debug!(
                user = %liquidated_user,
                collateral = %self.policy.collateral_asset,
                "No position in configured collateral reserve"
            );
            return Ok(None);
        };

        let balance = position.underlying_balance;
        if balance.is_zero() {
            debug!(user = %liquidated_user, "Collateral balance is zero, nothing to seize");
            return Ok(None);
        }

        let purchase_amount = self.purchase_amount(balance, position.decimals)?;

        debug!(
            user = %liquidated_user,
            health_factor = %summary.health_factor,
            collateral_balance = %balance,
            purchase_amount = %purchase_amount,
            "Liquidation triggered"
        );

        Ok(Some(LiquidationRequest {
            liquidator: self.policy.liquidator,
            liquidated_user,
            debt_asset: self.policy.debt_asset,
            collateral_asset: self.policy.collateral_asset,
            purchase_amount,
            receive_collateral_as_token: self.policy.receive_collateral_as_token,
        }))
    }

    /// `balance * fraction`, truncated to the asset's precision and kept in `(0, balance]`.
    fn purchase_amount(&self, balance: Decimal, decimals: u32) -> Result<Decimal> {
        let scale = decimals.min(MAX_DECIMAL_SCALE);
        let amount = math::mul_floor(balance, self.policy.collateral_fraction, scale)?;

        // A dust balance can truncate to zero; one smallest unit never exceeds it
        // unless the balance itself is finer than the asset precision.
        let smallest_unit = Decimal::new(1, scale);
        Ok(amount.max(smallest_unit).min(balance))
    }
}
