//! Tier Resolver.
//!
//! Maps a score to its unique [`PayTier`]. The tier table is read through
//! the cache: on a miss it is loaded from the store and written back. The
//! cache entry has no TTL; tier administration deletes it in the same
//! transaction as the store write.

use std::sync::Arc;

use tracing::{error, warn};

use payflow_store::cache::{self, keys};
use payflow_store::{KvCache, LedgerStore};
use payflow_types::{PayTier, PayflowError, Result, TierTable};

/// Read-through access to the tier table.
#[derive(Clone)]
pub struct TierResolver {
    cache: Arc<dyn KvCache>,
}

impl TierResolver {
    #[must_use]
    pub fn new(cache: Arc<dyn KvCache>) -> Self {
        Self { cache }
    }

    /// The current tier table, from cache when possible.
    pub fn table<S: LedgerStore>(&self, store: &S) -> Result<TierTable> {
        match cache::get_json::<TierTable>(self.cache.as_ref(), keys::PAY_TIERS) {
            Ok(Some(table)) => return Ok(table),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "tier cache read failed, using store"),
        }
        let table = store.tiers()?;
        if let Err(e) = table.check_partition() {
            warn!(error = %e, "stored tier table does not partition the score range");
        }
        if !table.is_empty() {
            if let Err(e) = cache::set_json(self.cache.as_ref(), keys::PAY_TIERS, &table, None) {
                warn!(error = %e, "tier cache repopulation failed");
            }
        }
        Ok(table)
    }

    /// The tier covering `score`.
    ///
    /// # Errors
    /// [`PayflowError::NoTierForScore`] means the seeded bands leave a gap.
    pub fn resolve<S: LedgerStore>(&self, store: &S, score: i64) -> Result<PayTier> {
        let table = self.table(store)?;
        table.resolve(score).cloned().inspect_err(|e| {
            error!(score, error = %e, "tier table does not cover score");
        })
    }

    /// Drop the cached table.
    pub fn invalidate(&self) -> Result<()> {
        self.cache
            .delete(keys::PAY_TIERS)
            .map_err(|e| PayflowError::Cache(format!("tier invalidation failed: {e}")))
    }
}
