//! Configuration administration hooks.
//!
//! Every write goes to the store and to the cache inside one transaction:
//! the cache step runs before commit, and a cache failure drops the
//! transaction so the store is never ahead of an entry that could not be
//! invalidated.

use std::sync::Arc;

use tracing::info;

use payflow_store::cache::keys;
use payflow_store::{KvCache, LedgerStore, StoreTx};
use payflow_types::{OrderKind, PayTier, PayflowError, Result, TierLevel};

use crate::system_config::{parse_ttl_minutes, ttl_key};
use crate::tier_resolver::TierResolver;

// ---------------------------------------------------------------------------
// TierAdmin
// ---------------------------------------------------------------------------

/// Create, update and delete pay tier bands.
pub struct TierAdmin<'a, S> {
    store: &'a S,
    tiers: TierResolver,
}

impl<'a, S: LedgerStore> TierAdmin<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, cache: Arc<dyn KvCache>) -> Self {
        Self {
            store,
            tiers: TierResolver::new(cache),
        }
    }

    /// Add a new band.
    ///
    /// # Errors
    /// [`PayflowError::InvalidTier`] if the level exists, a rate is out of
    /// range, the score range is empty, or it overlaps another band.
    pub fn create(&self, tier: &PayTier) -> Result<()> {
        let mut tx = self.store.begin()?;
        let current = tx.tiers()?;
        if current.get(tier.level).is_some() {
            return Err(PayflowError::InvalidTier {
                reason: format!("{} already exists", tier.level),
            });
        }
        current.check_insert(tier)?;
        tx.upsert_tier(tier)?;
        self.tiers.invalidate()?;
        tx.commit()?;
        info!(level = %tier.level, min = tier.min_score, max = ?tier.max_score, "tier created");
        Ok(())
    }

    /// Replace an existing band.
    pub fn update(&self, tier: &PayTier) -> Result<()> {
        let mut tx = self.store.begin()?;
        let current = tx.tiers()?;
        if current.get(tier.level).is_none() {
            return Err(PayflowError::TierNotFound(tier.level.to_string()));
        }
        current.check_insert(tier)?;
        tx.upsert_tier(tier)?;
        self.tiers.invalidate()?;
        tx.commit()?;
        info!(level = %tier.level, fee_rate = %tier.fee_rate, "tier updated");
        Ok(())
    }

    pub fn delete(&self, level: TierLevel) -> Result<()> {
        let mut tx = self.store.begin()?;
        if !tx.delete_tier(level)? {
            return Err(PayflowError::TierNotFound(level.to_string()));
        }
        self.tiers.invalidate()?;
        tx.commit()?;
        info!(%level, "tier deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SystemConfigAdmin
// ---------------------------------------------------------------------------

/// Write system config values.
pub struct SystemConfigAdmin<'a, S> {
    store: &'a S,
    cache: Arc<dyn KvCache>,
}

impl<'a, S: LedgerStore> SystemConfigAdmin<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, cache: Arc<dyn KvCache>) -> Self {
        Self { store, cache }
    }

    /// Set `key` to `value`, overwriting its cache entry.
    ///
    /// Order TTL keys must hold a positive number of minutes.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            return Err(PayflowError::Configuration("empty config key".to_string()));
        }
        if [OrderKind::MerchantPayment, OrderKind::Online]
            .into_iter()
            .any(|kind| ttl_key(kind) == key)
        {
            parse_ttl_minutes(key, value)?;
        }
        let mut tx = self.store.begin()?;
        tx.set_system_config(key, value)?;
        self.cache
            .set(&keys::system_config(key), value.to_string(), None)?;
        tx.commit()?;
        info!(key, value, "system config updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payflow_store::{MemoryCache, MemoryStore};
    use payflow_types::{SystemClock, TierTable};
    use rust_decimal::Decimal;

    fn setup() -> (MemoryStore, Arc<MemoryCache>) {
        let store = MemoryStore::default();
        store.seed_tiers(TierTable::new(vec![
            PayTier::dummy(1, 0, Some(100), Decimal::new(5, 2), None),
            PayTier::dummy(2, 100, None, Decimal::new(2, 2), None),
        ]));
        (store, Arc::new(MemoryCache::new(Arc::new(SystemClock))))
    }

    #[test]
    fn update_invalidates_cached_table() {
        let (store, cache) = setup();
        let resolver = TierResolver::new(cache.clone());
        assert_eq!(resolver.resolve(&store, 0).unwrap().fee_rate, Decimal::new(5, 2));

        let admin = TierAdmin::new(&store, cache.clone());
        let mut tier = store.tiers().unwrap().get(TierLevel(1)).unwrap().clone();
        tier.fee_rate = Decimal::new(4, 2);
        admin.update(&tier).unwrap();

        assert!(cache.get(keys::PAY_TIERS).unwrap().is_none());
        assert_eq!(resolver.resolve(&store, 0).unwrap().fee_rate, Decimal::new(4, 2));
    }

    #[test]
    fn create_rejects_overlap_and_duplicates() {
        let (store, cache) = setup();
        let admin = TierAdmin::new(&store, cache);
        let overlapping = PayTier::dummy(3, 50, Some(150), Decimal::ZERO, None);
        assert!(matches!(
            admin.create(&overlapping),
            Err(PayflowError::InvalidTier { .. })
        ));
        let duplicate = PayTier::dummy(1, 0, Some(100), Decimal::ZERO, None);
        assert!(admin.create(&duplicate).is_err());
        assert_eq!(store.tiers().unwrap().tiers().len(), 2);
    }

    #[test]
    fn create_rejects_bad_rates() {
        let (store, cache) = setup();
        let admin = TierAdmin::new(&store, cache);
        admin.delete(TierLevel(2)).unwrap();
        let bad = PayTier::dummy(2, 100, None, Decimal::new(101, 2), None);
        assert!(admin.create(&bad).is_err());
        let good = PayTier::dummy(2, 100, None, Decimal::new(1, 2), None);
        admin.create(&good).unwrap();
        store.tiers().unwrap().check_partition().unwrap();
    }

    #[test]
    fn delete_unknown_level() {
        let (store, cache) = setup();
        let admin = TierAdmin::new(&store, cache);
        assert!(matches!(
            admin.delete(TierLevel(9)),
            Err(PayflowError::TierNotFound(_))
        ));
    }

    #[test]
    fn system_config_set_overwrites_cache() {
        let (store, cache) = setup();
        let admin = SystemConfigAdmin::new(&store, cache.clone());
        admin.set("merchant_order_expire_minutes", "7").unwrap();
        assert_eq!(
            store
                .system_config("merchant_order_expire_minutes")
                .unwrap()
                .as_deref(),
            Some("7")
        );
        assert_eq!(
            cache
                .get(&keys::system_config("merchant_order_expire_minutes"))
                .unwrap()
                .as_deref(),
            Some("7")
        );
        assert!(admin.set("merchant_order_expire_minutes", "0").is_err());
        assert!(admin.set("", "x").is_err());
    }
}
