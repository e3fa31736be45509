//! Engine configuration.
//!
//! Static settings load from JSON; any field may be omitted and falls back
//! to its default. Values an operator tunes at runtime (order TTLs) are
//! also read from the system config store, which takes precedence.

use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::{constants, OrderKind, PayflowError, Result};

/// How many score points a party earns from a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreRule {
    /// No score accrues.
    None,
    /// `round(amount)`, independent of tier.
    RoundedAmount,
    /// `round(amount × tier.score_rate)` using the party's own tier.
    TierRate,
}

/// Score accrual rules for both sides of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePolicy {
    pub payer: ScoreRule,
    pub merchant: ScoreRule,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            payer: ScoreRule::RoundedAmount,
            merchant: ScoreRule::None,
        }
    }
}

/// Settings for a settlement engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fallback validity of merchant orders, in minutes.
    pub merchant_order_ttl_minutes: i64,
    /// Fallback validity of online orders, in minutes.
    pub online_order_ttl_minutes: i64,
    /// Payer-facing pay page; the token is appended as a query parameter.
    pub pay_url: String,
    /// Offset from UTC that defines "local midnight" for daily limits.
    pub day_offset_seconds: i32,
    /// How long blocking row and advisory locks may wait.
    pub lock_timeout_ms: u64,
    /// Order kinds whose spend counts toward, and is checked against, the daily limit.
    pub limited_kinds: Vec<OrderKind>,
    pub score_policy: ScorePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            merchant_order_ttl_minutes: constants::DEFAULT_MERCHANT_ORDER_TTL_MINUTES,
            online_order_ttl_minutes: constants::DEFAULT_ONLINE_ORDER_TTL_MINUTES,
            pay_url: constants::DEFAULT_PAY_URL.to_string(),
            day_offset_seconds: 0,
            lock_timeout_ms: constants::DEFAULT_LOCK_TIMEOUT_MS,
            limited_kinds: vec![OrderKind::MerchantPayment, OrderKind::Online],
            score_policy: ScorePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PayflowError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.merchant_order_ttl_minutes <= 0 || self.online_order_ttl_minutes <= 0 {
            return Err(PayflowError::Configuration(
                "order TTLs must be positive".to_string(),
            ));
        }
        if self.pay_url.is_empty() {
            return Err(PayflowError::Configuration("pay_url is empty".to_string()));
        }
        self.day_offset()?;
        Ok(())
    }

    /// The fixed offset in which calendar days are counted.
    pub fn day_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.day_offset_seconds).ok_or_else(|| {
            PayflowError::Configuration(format!(
                "day_offset_seconds {} is out of range",
                self.day_offset_seconds
            ))
        })
    }

    #[must_use]
    pub fn lock_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lock_timeout_ms)
    }

    /// Fallback TTL for an order of `kind`.
    #[must_use]
    pub fn default_ttl(&self, kind: OrderKind) -> Duration {
        match kind {
            OrderKind::Online => Duration::minutes(self.online_order_ttl_minutes),
            OrderKind::MerchantPayment | OrderKind::PeerTransfer => {
                Duration::minutes(self.merchant_order_ttl_minutes)
            }
        }
    }
}
