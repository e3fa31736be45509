//! Fixed two-decimal currency helpers.
//!
//! Amounts are `rust_decimal::Decimal` everywhere. Rounding is always
//! half-away-from-zero, never banker's rounding.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{constants, PayflowError, Result};

/// Validate a user-supplied amount: strictly positive and at most
/// [`constants::MONEY_SCALE`] significant decimal places.
///
/// Trailing zeros do not count as decimal places (`1.500` is accepted).
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(PayflowError::InvalidAmount {
            reason: "amount must be greater than zero".to_string(),
        });
    }
    let normalized = amount.normalize();
    if normalized.scale() > constants::MONEY_SCALE {
        return Err(PayflowError::InvalidAmount {
            reason: format!(
                "amount {amount} has more than {} decimal places",
                constants::MONEY_SCALE
            ),
        });
    }
    Ok(normalized)
}

/// Validate a rate: `0 <= rate <= 1` with at most two decimal places.
pub fn validate_rate(name: &str, rate: Decimal) -> Result<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(PayflowError::InvalidTier {
            reason: format!("{name} {rate} must be between 0 and 1"),
        });
    }
    if rate.normalize().scale() > constants::RATE_SCALE {
        return Err(PayflowError::InvalidTier {
            reason: format!(
                "{name} {rate} has more than {} decimal places",
                constants::RATE_SCALE
            ),
        });
    }
    Ok(())
}

/// Round to currency precision, half away from zero.
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(constants::MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to a whole score point, half away from zero.
///
/// # Errors
/// Returns [`PayflowError::Internal`] if the value does not fit in `i64`.
pub fn round_score(value: Decimal) -> Result<i64> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| PayflowError::Internal(format!("score {value} overflows i64")))
}
