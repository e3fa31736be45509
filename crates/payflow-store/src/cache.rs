//! Key-value cache seam.
//!
//! The cache only ever accelerates reads of configuration (tier table,
//! system config) and holds the reverse token index. It is never
//! consulted for balances or order status.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use payflow_types::{Clock, PayflowError, Result};

/// String-valued cache with optional per-entry TTL.
pub trait KvCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`; `None` TTL means no expiry.
    fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;
}

/// Read and decode a JSON value. A value that no longer decodes is
/// treated as a miss.
pub fn get_json<T: DeserializeOwned>(cache: &dyn KvCache, key: &str) -> Result<Option<T>> {
    let Some(raw) = cache.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding undecodable cache entry");
            Ok(None)
        }
    }
}

/// Encode `value` as JSON and store it.
pub fn set_json<T: Serialize>(
    cache: &dyn KvCache,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, raw, ttl)
}

/// Cache key layout.
pub mod keys {
    /// The whole tier table lives under a single key.
    pub const PAY_TIERS: &str = "payment:tiers";

    /// Reverse index from an order token to the minting merchant.
    #[must_use]
    pub fn order_token(token: &str) -> String {
        format!("payment:order:{token}")
    }

    #[must_use]
    pub fn system_config(key: &str) -> String {
        format!("system:config:{key}")
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-process cache on a sharded concurrent map. Expiry is lazy: an
/// entry past its deadline is removed the next time it is read.
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of stored entries, including ones that expired but were not yet read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let hit = self.entries.get(key).map(|entry| {
            let live = entry.expires_at.is_none_or(|at| at > now);
            (live, entry.value.clone())
        });
        match hit {
            Some((true, value)) => Ok(Some(value)),
            Some((false, _)) => {
                self.entries
                    .remove_if(key, |_, entry| entry.expires_at.is_some_and(|at| at <= now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        if ttl.is_some_and(|ttl| ttl <= Duration::zero()) {
            return Err(PayflowError::Cache(format!("non-positive TTL for {key}")));
        }
        let expires_at = ttl.map(|ttl| self.clock.now() + ttl);
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}
