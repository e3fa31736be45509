//! Runtime-tunable system config, read through the cache.

use std::sync::Arc;

use chrono::Duration;
use tracing::warn;

use payflow_store::cache::keys;
use payflow_store::{KvCache, LedgerStore};
use payflow_types::constants::{
    CONFIG_KEY_MERCHANT_ORDER_EXPIRE_MINUTES, CONFIG_KEY_WEBSITE_ORDER_EXPIRE_MINUTES,
};
use payflow_types::{OrderKind, PayflowError, Result};

/// The system config key holding the TTL of orders of `kind`.
#[must_use]
pub fn ttl_key(kind: OrderKind) -> &'static str {
    match kind {
        OrderKind::Online => CONFIG_KEY_WEBSITE_ORDER_EXPIRE_MINUTES,
        OrderKind::MerchantPayment | OrderKind::PeerTransfer => {
            CONFIG_KEY_MERCHANT_ORDER_EXPIRE_MINUTES
        }
    }
}

/// Parse a TTL value in whole minutes.
pub fn parse_ttl_minutes(key: &str, raw: &str) -> Result<Duration> {
    match raw.trim().parse::<i64>() {
        Ok(minutes) if minutes > 0 => Ok(Duration::minutes(minutes)),
        _ => Err(PayflowError::Configuration(format!(
            "{key} must be a positive number of minutes, got {raw:?}"
        ))),
    }
}

/// Cache-or-store reader for system config values.
#[derive(Clone)]
pub struct SystemConfigReader {
    cache: Arc<dyn KvCache>,
}

impl SystemConfigReader {
    #[must_use]
    pub fn new(cache: Arc<dyn KvCache>) -> Self {
        Self { cache }
    }

    pub fn get<S: LedgerStore>(&self, store: &S, key: &str) -> Result<Option<String>> {
        let cache_key = keys::system_config(key);
        match self.cache.get(&cache_key) {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "system config cache read failed"),
        }
        let value = store.system_config(key)?;
        if let Some(value) = &value {
            if let Err(e) = self.cache.set(&cache_key, value.clone(), None) {
                warn!(key, error = %e, "system config cache repopulation failed");
            }
        }
        Ok(value)
    }

    /// Configured TTL for orders of `kind`, or `None` when unset or
    /// malformed (the caller falls back to its static default).
    pub fn order_ttl<S: LedgerStore>(&self, store: &S, kind: OrderKind) -> Result<Option<Duration>> {
        let key = ttl_key(kind);
        let Some(raw) = self.get(store, key)? else {
            return Ok(None);
        };
        match parse_ttl_minutes(key, &raw) {
            Ok(ttl) => Ok(Some(ttl)),
            Err(e) => {
                warn!(error = %e, "ignoring malformed order TTL");
                Ok(None)
            }
        }
    }
}
