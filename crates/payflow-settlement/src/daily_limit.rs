//! Daily Limit Enforcer.
//!
//! For a limited tier, settlements by the same payer on the same calendar
//! day are serialised by a transaction-scoped advisory lock on
//! [`DailySpendKey`]. Only while holding it is the day's settled spend
//! summed and compared against the limit, so two under-limit checks can
//! never both pass and jointly exceed it. The lock is released when the
//! enclosing transaction ends.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use payflow_store::StoreTx;
use payflow_types::{EngineConfig, OrderKind, PayTier, PayflowError, Result, UserId};

/// Domain separator for advisory lock keys.
const DAILY_SPEND_DOMAIN: &[u8] = b"payflow:daily-spend:v1:";

// ---------------------------------------------------------------------------
// DailySpendKey
// ---------------------------------------------------------------------------

/// Advisory lock key for one payer on one calendar day.
///
/// Derived as the first 8 bytes (big-endian) of
/// `SHA-256(domain ‖ payer ‖ yyyymmdd)`. A collision between two
/// (payer, day) pairs only serialises them needlessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DailySpendKey(pub i64);

impl DailySpendKey {
    #[must_use]
    pub fn derive(payer: UserId, day: NaiveDate) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DAILY_SPEND_DOMAIN);
        hasher.update(payer.as_bytes());
        hasher.update(day.format("%Y%m%d").to_string().as_bytes());
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Self(i64::from_be_bytes(prefix))
    }
}

// ---------------------------------------------------------------------------
// DayWindow
// ---------------------------------------------------------------------------

/// `[local midnight, local midnight + 24h)` containing a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Outcome of a passed limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitCheck {
    /// The tier has no daily limit.
    Unlimited,
    /// Spend after this settlement stays within the limit.
    Within { limit: Decimal, used: Decimal },
}

// ---------------------------------------------------------------------------
// DailyLimitEnforcer
// ---------------------------------------------------------------------------

/// Checks candidate spend against a tier's daily limit.
#[derive(Debug, Clone)]
pub struct DailyLimitEnforcer {
    offset: FixedOffset,
    limited_kinds: Vec<OrderKind>,
}

impl DailyLimitEnforcer {
    #[must_use]
    pub fn new(offset: FixedOffset, limited_kinds: Vec<OrderKind>) -> Self {
        Self {
            offset,
            limited_kinds,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(config.day_offset()?, config.limited_kinds.clone()))
    }

    /// Whether spend of `kind` is counted and checked.
    #[must_use]
    pub fn applies_to(&self, kind: OrderKind) -> bool {
        self.limited_kinds.contains(&kind)
    }

    /// The calendar day containing `now`, in the configured offset.
    pub fn window(&self, now: DateTime<Utc>) -> Result<DayWindow> {
        let day = now.with_timezone(&self.offset).date_naive();
        let start = self
            .offset
            .from_local_datetime(&day.and_time(chrono::NaiveTime::MIN))
            .single()
            .ok_or_else(|| PayflowError::Internal(format!("no local midnight for {day}")))?
            .with_timezone(&Utc);
        Ok(DayWindow {
            day,
            start,
            end: start + Duration::hours(24),
        })
    }

    /// Settled spend of limited kinds by `payer` on the day containing
    /// `now`. Takes no lock; use [`Self::authorize`] before spending.
    pub fn spent_today<T: StoreTx>(
        &self,
        tx: &mut T,
        payer: UserId,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        let window = self.window(now)?;
        tx.settled_spend(payer, &self.limited_kinds, window.start, window.end)
    }

    /// Authorize spending `amount` under `tier` inside `tx`.
    ///
    /// # Errors
    /// - [`PayflowError::DailyLimitExceeded`] if `used + amount > limit`
    /// - [`PayflowError::LockTimeout`] if the day's lock could not be taken
    pub fn authorize<T: StoreTx>(
        &self,
        tx: &mut T,
        payer: UserId,
        amount: Decimal,
        tier: &PayTier,
        now: DateTime<Utc>,
    ) -> Result<LimitCheck> {
        let Some(limit) = tier.effective_daily_limit() else {
            debug!(%payer, tier = %tier.level, "tier is unlimited");
            return Ok(LimitCheck::Unlimited);
        };

        let window = self.window(now)?;
        tx.advisory_xact_lock(DailySpendKey::derive(payer, window.day).0)?;
        let used = tx.settled_spend(payer, &self.limited_kinds, window.start, window.end)?;

        if used + amount > limit {
            warn!(%payer, %limit, %used, %amount, "daily limit exceeded");
            return Err(PayflowError::DailyLimitExceeded {
                limit,
                used,
                requested: amount,
            });
        }
        Ok(LimitCheck::Within { limit, used })
    }
}
