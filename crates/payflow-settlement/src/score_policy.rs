//! Score accrual.

use rust_decimal::Decimal;

use payflow_types::money::round_score;
use payflow_types::{PayTier, Result, ScoreRule};

/// Points earned for moving `amount` under `rule`, where `tier` is the
/// earning party's own tier.
pub fn accrue(rule: ScoreRule, amount: Decimal, tier: &PayTier) -> Result<i64> {
    match rule {
        ScoreRule::None => Ok(0),
        ScoreRule::RoundedAmount => round_score(amount),
        ScoreRule::TierRate => round_score(amount * tier.score_rate),
    }
}
