//! Pay tier configuration: score-indexed bands that decide fee rate,
//! score accrual rate and daily spend limit.
//!
//! A valid table partitions `[0, ∞)`: bands are sorted by `min_score`,
//! each band's exclusive `max_score` equals the next band's `min_score`,
//! and only the last band is unbounded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{money, PayflowError, Result, TierLevel};

/// A single score band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayTier {
    pub level: TierLevel,
    /// Inclusive lower bound.
    pub min_score: i64,
    /// Exclusive upper bound; `None` means unbounded.
    pub max_score: Option<i64>,
    /// Merchant fee rate in `[0, 1]`, at most two decimals.
    pub fee_rate: Decimal,
    /// Score accrual rate in `[0, 1]`, at most two decimals.
    pub score_rate: Decimal,
    /// Daily spend limit; `None` or non-positive means unlimited.
    pub daily_limit: Option<Decimal>,
}

impl PayTier {
    /// Does this band cover `score`?
    #[must_use]
    pub fn contains(&self, score: i64) -> bool {
        score >= self.min_score && self.max_score.is_none_or(|max| score < max)
    }

    /// The limit to enforce, or `None` when the tier is unlimited.
    #[must_use]
    pub fn effective_daily_limit(&self) -> Option<Decimal> {
        self.daily_limit.filter(|limit| *limit > Decimal::ZERO)
    }

    /// Fee rate as a whole percentage, truncated (0.05 → 5).
    #[must_use]
    pub fn fee_percent(&self) -> Decimal {
        (self.fee_rate * Decimal::ONE_HUNDRED).trunc()
    }

    /// Validate rates and the score range of this band in isolation.
    pub fn validate(&self) -> Result<()> {
        money::validate_rate("fee_rate", self.fee_rate)?;
        money::validate_rate("score_rate", self.score_rate)?;
        if self.min_score < 0 {
            return Err(PayflowError::InvalidTier {
                reason: format!("{}: min_score {} is negative", self.level, self.min_score),
            });
        }
        if let Some(max) = self.max_score {
            if max <= self.min_score {
                return Err(PayflowError::InvalidTier {
                    reason: format!(
                        "{}: max_score {max} must be greater than min_score {}",
                        self.level, self.min_score
                    ),
                });
            }
        }
        Ok(())
    }

    /// Whether two bands share any score.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let self_below_other = self.max_score.is_some_and(|max| max <= other.min_score);
        let other_below_self = other.max_score.is_some_and(|max| max <= self.min_score);
        !(self_below_other || other_below_self)
    }

    /// Test helper: a band with the given bounds, fee rate and limit.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn dummy(
        level: u16,
        min_score: i64,
        max_score: Option<i64>,
        fee_rate: Decimal,
        daily_limit: Option<Decimal>,
    ) -> Self {
        Self {
            level: TierLevel(level),
            min_score,
            max_score,
            fee_rate,
            score_rate: Decimal::ZERO,
            daily_limit,
        }
    }
}

/// The full set of bands, sorted by `min_score`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierTable {
    tiers: Vec<PayTier>,
}

impl TierTable {
    #[must_use]
    pub fn new(mut tiers: Vec<PayTier>) -> Self {
        tiers.sort_by_key(|t| (t.min_score, t.level));
        Self { tiers }
    }

    #[must_use]
    pub fn tiers(&self) -> &[PayTier] {
        &self.tiers
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    #[must_use]
    pub fn get(&self, level: TierLevel) -> Option<&PayTier> {
        self.tiers.iter().find(|t| t.level == level)
    }

    /// Return the unique band covering `score`.
    ///
    /// # Errors
    /// - [`PayflowError::NoTierForScore`] if no band covers the score
    /// - [`PayflowError::InvalidTier`] if more than one band does
    pub fn resolve(&self, score: i64) -> Result<&PayTier> {
        let mut matches = self.tiers.iter().filter(|t| t.contains(score));
        let first = matches.next().ok_or(PayflowError::NoTierForScore(score))?;
        if let Some(second) = matches.next() {
            return Err(PayflowError::InvalidTier {
                reason: format!(
                    "score {score} matches both {} and {}",
                    first.level, second.level
                ),
            });
        }
        Ok(first)
    }

    /// Check that `candidate` can join the table without overlapping any
    /// band other than the one it replaces (same level).
    pub fn check_insert(&self, candidate: &PayTier) -> Result<()> {
        candidate.validate()?;
        if let Some(clash) = self
            .tiers
            .iter()
            .filter(|t| t.level != candidate.level)
            .find(|t| t.overlaps(candidate))
        {
            return Err(PayflowError::InvalidTier {
                reason: format!("{} overlaps {}", candidate.level, clash.level),
            });
        }
        Ok(())
    }

    /// Verify the table partitions `[0, ∞)` with no gap and no overlap.
    pub fn check_partition(&self) -> Result<()> {
        let mut expected_min = 0_i64;
        let last = self.tiers.len().checked_sub(1).ok_or_else(|| PayflowError::InvalidTier {
            reason: "tier table is empty".to_string(),
        })?;
        for (i, tier) in self.tiers.iter().enumerate() {
            tier.validate()?;
            if tier.min_score != expected_min {
                return Err(PayflowError::InvalidTier {
                    reason: format!(
                        "{} starts at {} but previous band ends at {expected_min}",
                        tier.level, tier.min_score
                    ),
                });
            }
            match (tier.max_score, i == last) {
                (Some(max), false) => expected_min = max,
                (None, true) => {}
                (Some(max), true) => {
                    return Err(PayflowError::InvalidTier {
                        reason: format!("scores from {max} upward are not covered"),
                    });
                }
                (None, false) => {
                    return Err(PayflowError::InvalidTier {
                        reason: format!("unbounded {} is not the last band", tier.level),
                    });
                }
            }
        }
        Ok(())
    }
}
