//! Fixed-point helpers for turning raw reserve data into decimal amounts.
//!
//! On-chain values stay in `U256` until the final conversion to `Decimal`,
//! so interest accrual follows the pool's own WAD/RAY arithmetic and only the
//! last step changes representation.

use alloy::primitives::U256;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Error, Result};

/// WAD constant: 1e18 for 18-decimal fixed-point values (health factor)
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// RAY constant: 1e27 for 27-decimal fixed-point values (indexes, rates)
pub const RAY: U256 = U256::from_limbs([11_515_845_246_265_065_472u64, 54_210_108, 0, 0]);

/// RAY / 2, used for half-up rounding in `ray_mul`
pub const HALF_RAY: U256 = U256::from_limbs([5_757_922_623_132_532_736u64, 27_105_054, 0, 0]);

/// Seconds per year used by the pool's rate model (365 days)
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Health factor decimals
pub const HEALTH_FACTOR_DECIMALS: u8 = 18;

/// 10^exp as U256.
#[inline]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Multiply two RAY values, rounding half up: (a * b + RAY/2) / RAY
#[inline]
pub fn ray_mul(a: U256, b: U256) -> U256 {
    if a.is_zero() || b.is_zero() {
        return U256::ZERO;
    }
    (a * b + HALF_RAY) / RAY
}

/// Linear interest factor (RAY) accumulated since `last_update`.
pub fn linear_interest(rate: U256, last_update: u64, now: u64) -> U256 {
    let elapsed = U256::from(now.saturating_sub(last_update));
    RAY + (rate * elapsed) / U256::from(SECONDS_PER_YEAR)
}

/// Compounded interest factor (RAY) accumulated since `last_update`.
///
/// Three-term binomial expansion of `(1 + rate/year)^elapsed`, which is what
/// the pool uses for variable debt. Slightly underestimates the true value.
pub fn compounded_interest(rate: U256, last_update: u64, now: u64) -> U256 {
    let elapsed = now.saturating_sub(last_update);
    if elapsed == 0 {
        return RAY;
    }

    let exp = U256::from(elapsed);
    let exp_minus_one = exp - U256::from(1u64);
    let exp_minus_two = if elapsed > 2 {
        exp - U256::from(2u64)
    } else {
        U256::ZERO
    };

    let year = U256::from(SECONDS_PER_YEAR);
    let base_power_two = ray_mul(rate, rate) / (year * year);
    let base_power_three = ray_mul(base_power_two, rate) / year;

    let second_term = exp * exp_minus_one * base_power_two / U256::from(2u64);
    let third_term = exp * exp_minus_one * exp_minus_two * base_power_three / U256::from(6u64);

    RAY + (rate * exp) / year + second_term + third_term
}

/// Supply index at `now`. Returns the stored index when no time has passed.
pub fn normalized_income(liquidity_index: U256, liquidity_rate: U256, last_update: u64, now: u64) -> U256 {
    if now <= last_update {
        return liquidity_index;
    }
    ray_mul(linear_interest(liquidity_rate, last_update, now), liquidity_index)
}

/// Variable borrow index at `now`. Returns the stored index when no time has passed.
pub fn normalized_variable_debt(
    variable_borrow_index: U256,
    variable_borrow_rate: U256,
    last_update: u64,
    now: u64,
) -> U256 {
    if now <= last_update {
        return variable_borrow_index;
    }
    ray_mul(compounded_interest(variable_borrow_rate, last_update, now), variable_borrow_index)
}

/// Scaled (index-divided) balance to underlying raw units.
#[inline]
pub fn scaled_to_underlying(scaled: U256, index: U256) -> U256 {
    ray_mul(scaled, index)
}

/// Convert a raw integer amount into a decimal with `decimals` places.
///
/// Exact; fails when the value does not fit `Decimal`'s 96-bit mantissa or the
/// scale exceeds 28.
pub fn to_decimal(raw: U256, decimals: u8) -> Result<Decimal> {
    if raw > U256::from(i128::MAX as u128) {
        return Err(Error::Malformed(format!(
            "value {raw} with {decimals} decimals exceeds decimal range"
        )));
    }
    let value: u128 = raw.to();
    Decimal::try_from_i128_with_scale(value as i128, u32::from(decimals)).map_err(|e| {
        Error::Malformed(format!(
            "value {raw} with {decimals} decimals not representable: {e}"
        ))
    })
}

/// Convert a decimal amount into raw integer units, rounding toward zero.
pub fn to_raw(amount: Decimal, decimals: u8) -> Result<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::Malformed(format!("negative amount {amount}")));
    }

    let truncated = amount.round_dp_with_strategy(u32::from(decimals), RoundingStrategy::ToZero);
    let mantissa = truncated.mantissa().unsigned_abs();
    let shift = u32::from(decimals).saturating_sub(truncated.scale());

    Ok(U256::from(mantissa) * pow10(shift as u8))
}

/// Largest mantissa a `Decimal` can hold (2^96 - 1).
const DECIMAL_MANTISSA_MAX: u128 = (1u128 << 96) - 1;

/// Exact `a * b` truncated toward zero at `scale` places (at most 28).
///
/// The full product of the mantissas is held in a `U256`, so nothing is
/// rounded before truncation. A result too wide for `Decimal` at `scale`
/// drops trailing digits, also toward zero, until it fits.
pub fn mul_floor(a: Decimal, b: Decimal, scale: u32) -> Result<Decimal> {
    if (a.is_sign_negative() && !a.is_zero()) || (b.is_sign_negative() && !b.is_zero()) {
        return Err(Error::Malformed(format!("negative operand in {a} * {b}")));
    }

    let product = U256::from(a.mantissa().unsigned_abs()) * U256::from(b.mantissa().unsigned_abs());
    let exact_scale = a.scale() + b.scale();
    let mut scale = scale.min(28);

    let mut raw = if exact_scale >= scale {
        product / pow10((exact_scale - scale) as u8)
    } else {
        product * pow10((scale - exact_scale) as u8)
    };

    let max = U256::from(DECIMAL_MANTISSA_MAX);
    while raw > max {
        if scale == 0 {
            return Err(Error::Malformed(format!("{a} * {b} exceeds decimal range")));
        }
        raw /= U256::from(10u64);
        scale -= 1;
    }

    Decimal::try_from_i128_with_scale(raw.to::<u128>() as i128, scale)
        .map_err(|e| Error::Malformed(format!("{a} * {b} not representable: {e}")))
}
