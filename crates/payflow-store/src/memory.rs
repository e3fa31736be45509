//! In-memory [`LedgerStore`].
//!
//! Committed state lives behind one mutex. Each [`MemoryTx`] stages its
//! writes privately and takes row and advisory scopes from
//! [`ScopeLockTable`]s owned by the store. On commit the staged writes are
//! applied under the table mutex and only then are the scopes released,
//! so a transaction that waited on a row always observes the previous
//! owner's result.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::debug;

use payflow_types::constants::DEFAULT_LOCK_TIMEOUT_MS;
use payflow_types::{
    AccountBalance, ClientId, EngineConfig, Merchant, Order, OrderId, OrderKind, OrderStatus, PayTier,
    PayflowError, Result, TierLevel, TierTable, UserAccount, UserId,
};

use crate::scope_lock::{ScopeBusy, ScopeLockTable, TxId};
use crate::store::{LedgerStore, StoreTx};

const TIER_ROW: &str = "pay_tier";

#[derive(Debug, Default)]
struct Tables {
    orders: HashMap<OrderId, Order>,
    users: HashMap<UserId, UserAccount>,
    merchants: HashMap<UserId, Merchant>,
    client_index: HashMap<ClientId, UserId>,
    tiers: TierTable,
    config: HashMap<String, String>,
}

/// Single-process reference store.
#[derive(Debug)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    order_locks: ScopeLockTable<OrderId>,
    user_locks: ScopeLockTable<UserId>,
    advisory_locks: ScopeLockTable<i64>,
    row_locks: ScopeLockTable<String>,
    next_tx: AtomicU64,
    lock_timeout: Duration,
}

impl MemoryStore {
    /// Create an empty store whose blocking locks give up after `lock_timeout`.
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            order_locks: ScopeLockTable::new(),
            user_locks: ScopeLockTable::new(),
            advisory_locks: ScopeLockTable::new(),
            row_locks: ScopeLockTable::new(),
            next_tx: AtomicU64::new(1),
            lock_timeout,
        }
    }

    /// Create an empty store using the engine's lock timeout.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.lock_timeout())
    }

    pub fn insert_user(&self, user: UserAccount) {
        self.tables.lock().users.insert(user.id, user);
    }

    /// Register `merchant` against an existing user.
    pub fn register_merchant(&self, merchant: Merchant) -> Result<()> {
        let mut tables = self.tables.lock();
        if !tables.users.contains_key(&merchant.user_id) {
            return Err(PayflowError::UserNotFound(merchant.user_id));
        }
        if let Some(owner) = tables.client_index.get(&merchant.client_id) {
            if *owner != merchant.user_id {
                return Err(PayflowError::Storage(format!(
                    "{} is already registered",
                    merchant.client_id
                )));
            }
        }
        tables
            .client_index
            .insert(merchant.client_id.clone(), merchant.user_id);
        tables.merchants.insert(merchant.user_id, merchant);
        Ok(())
    }

    /// Replace the committed tier table wholesale.
    pub fn seed_tiers(&self, tiers: TierTable) {
        self.tables.lock().tiers = tiers;
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.tables.lock().orders.len()
    }

    /// Number of row, order and advisory scopes currently held by open transactions.
    #[must_use]
    pub fn held_lock_count(&self) -> usize {
        self.order_locks.held_count()
            + self.user_locks.held_count()
            + self.advisory_locks.held_count()
            + self.row_locks.held_count()
    }

    fn release_all(&self, tx: TxId) {
        self.order_locks.release_all(tx);
        self.user_locks.release_all(tx);
        self.advisory_locks.release_all(tx);
        self.row_locks.release_all(tx);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS))
    }
}

impl LedgerStore for MemoryStore {
    type Tx<'a> = MemoryTx<'a>;

    fn begin(&self) -> Result<MemoryTx<'_>> {
        let id = self.next_tx.fetch_add(1, Ordering::Relaxed);
        debug!(tx = id, "begin");
        Ok(MemoryTx {
            store: self,
            id,
            orders: HashMap::new(),
            balances: HashMap::new(),
            tiers: None,
            config: HashMap::new(),
            committed: false,
        })
    }

    fn merchant_by_client_id(&self, client_id: &ClientId) -> Result<Option<Merchant>> {
        let tables = self.tables.lock();
        Ok(tables
            .client_index
            .get(client_id)
            .and_then(|user| tables.merchants.get(user))
            .cloned())
    }

    fn merchant(&self, user: UserId) -> Result<Option<Merchant>> {
        Ok(self.tables.lock().merchants.get(&user).cloned())
    }

    fn user(&self, id: UserId) -> Result<Option<UserAccount>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.lock().orders.get(&id).cloned())
    }

    fn tiers(&self) -> Result<TierTable> {
        Ok(self.tables.lock().tiers.clone())
    }

    fn system_config(&self, key: &str) -> Result<Option<String>> {
        Ok(self.tables.lock().config.get(key).cloned())
    }
}

/// A [`MemoryStore`] transaction. Rolls back on drop unless committed.
#[derive(Debug)]
pub struct MemoryTx<'a> {
    store: &'a MemoryStore,
    id: TxId,
    /// Orders inserted or locked by this transaction, in their staged form.
    orders: HashMap<OrderId, Order>,
    /// Balances of user rows this transaction has locked.
    balances: HashMap<UserId, AccountBalance>,
    tiers: Option<TierTable>,
    config: HashMap<String, String>,
    committed: bool,
}

impl MemoryTx<'_> {
    fn timed_out(resource: String) -> impl FnOnce(ScopeBusy) -> PayflowError {
        move |_| PayflowError::LockTimeout { resource }
    }

    /// Lock the user row and return its staged balance.
    fn locked_balance(&mut self, user: UserId) -> Result<&mut AccountBalance> {
        match self.balances.entry(user) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                self.store
                    .user_locks
                    .acquire(&user, self.id, self.store.lock_timeout)
                    .map_err(Self::timed_out(format!("user {user}")))?;
                let committed = self
                    .store
                    .tables
                    .lock()
                    .users
                    .get(&user)
                    .map(|u| u.balance.clone())
                    .ok_or(PayflowError::UserNotFound(user))?;
                Ok(slot.insert(committed))
            }
        }
    }

    fn lock_row(&self, row: String) -> Result<()> {
        self.store
            .row_locks
            .acquire(&row, self.id, self.store.lock_timeout)
            .map_err(Self::timed_out(row.clone()))
    }
}

fn add_score(balance: &mut AccountBalance, score: i64) -> Result<()> {
    balance.score = balance
        .score
        .checked_add(score)
        .ok_or_else(|| PayflowError::Internal(format!("score overflow adding {score}")))?;
    Ok(())
}

impl StoreTx for MemoryTx<'_> {
    fn insert_order(&mut self, order: &Order) -> Result<()> {
        let exists = self.store.tables.lock().orders.contains_key(&order.id);
        if exists || self.orders.contains_key(&order.id) {
            return Err(PayflowError::Storage(format!("order {} already exists", order.id)));
        }
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    fn lock_pending_order_nowait(&mut self, id: OrderId) -> Result<Option<Order>> {
        if let Some(staged) = self.orders.get(&id) {
            return Ok((staged.status == OrderStatus::Pending).then(|| staged.clone()));
        }
        self.store
            .order_locks
            .try_acquire(&id, self.id)
            .map_err(|_| PayflowError::LockContention {
                resource: format!("order {id}"),
            })?;
        let committed = self.store.tables.lock().orders.get(&id).cloned();
        match committed {
            Some(order) if order.status == OrderStatus::Pending => {
                self.orders.insert(id, order.clone());
                Ok(Some(order))
            }
            _ => {
                self.store.order_locks.release(&id, self.id);
                Ok(None)
            }
        }
    }

    fn save_order(&mut self, order: &Order) -> Result<()> {
        match self.orders.get_mut(&order.id) {
            Some(staged) => {
                *staged = order.clone();
                Ok(())
            }
            None => Err(PayflowError::Storage(format!(
                "order {} is not locked by this transaction",
                order.id
            ))),
        }
    }

    fn user(&mut self, id: UserId) -> Result<Option<UserAccount>> {
        let committed = self.store.tables.lock().users.get(&id).cloned();
        Ok(committed.map(|mut user| {
            if let Some(staged) = self.balances.get(&id) {
                user.balance = staged.clone();
            }
            user
        }))
    }

    fn advisory_xact_lock(&mut self, key: i64) -> Result<()> {
        self.store
            .advisory_locks
            .acquire(&key, self.id, self.store.lock_timeout)
            .map_err(Self::timed_out(format!("advisory {key}")))
    }

    fn settled_spend(
        &mut self,
        payer: UserId,
        kinds: &[OrderKind],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal> {
        let tables = self.store.tables.lock();
        let committed = tables
            .orders
            .values()
            .filter(|o| !self.orders.contains_key(&o.id));
        Ok(committed
            .chain(self.orders.values())
            .filter(|o| o.status == OrderStatus::Settled && o.payer == Some(payer))
            .filter(|o| kinds.contains(&o.kind))
            .filter(|o| o.settled_at.is_some_and(|at| at >= from && at < to))
            .map(|o| o.amount)
            .sum())
    }

    fn lock_user(&mut self, user: UserId) -> Result<()> {
        self.locked_balance(user).map(|_| ())
    }

    fn debit_if_sufficient(&mut self, user: UserId, amount: Decimal, score: i64) -> Result<bool> {
        let balance = self.locked_balance(user)?;
        if balance.available < amount {
            return Ok(false);
        }
        balance.available -= amount;
        balance.total_paid += amount;
        add_score(balance, score)?;
        Ok(true)
    }

    fn credit(&mut self, user: UserId, amount: Decimal, score: i64) -> Result<()> {
        let balance = self.locked_balance(user)?;
        balance.available += amount;
        balance.total_received += amount;
        add_score(balance, score)
    }

    fn tiers(&mut self) -> Result<TierTable> {
        match &self.tiers {
            Some(staged) => Ok(staged.clone()),
            None => Ok(self.store.tables.lock().tiers.clone()),
        }
    }

    fn upsert_tier(&mut self, tier: &PayTier) -> Result<()> {
        self.lock_row(TIER_ROW.to_string())?;
        let current = StoreTx::tiers(self)?;
        let mut tiers: Vec<PayTier> = current
            .tiers()
            .iter()
            .filter(|t| t.level != tier.level)
            .cloned()
            .collect();
        tiers.push(tier.clone());
        self.tiers = Some(TierTable::new(tiers));
        Ok(())
    }

    fn delete_tier(&mut self, level: TierLevel) -> Result<bool> {
        self.lock_row(TIER_ROW.to_string())?;
        let current = StoreTx::tiers(self)?;
        if current.get(level).is_none() {
            return Ok(false);
        }
        let tiers = current
            .tiers()
            .iter()
            .filter(|t| t.level != level)
            .cloned()
            .collect();
        self.tiers = Some(TierTable::new(tiers));
        Ok(true)
    }

    fn set_system_config(&mut self, key: &str, value: &str) -> Result<()> {
        self.lock_row(format!("system_config:{key}"))?;
        self.config.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn lock_expired_pending(&mut self, before: DateTime<Utc>, limit: usize) -> Result<Vec<Order>> {
        let tables = self.store.tables.lock();
        let mut candidates: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.is_expired_at(before))
            .collect();
        candidates.sort_by_key(|o| (o.expires_at, o.id));

        let mut locked = Vec::new();
        for order in candidates {
            if locked.len() == limit {
                break;
            }
            if self.store.order_locks.try_acquire(&order.id, self.id).is_ok() {
                self.orders.insert(order.id, order.clone());
                locked.push(order.clone());
            }
        }
        Ok(locked)
    }

    fn commit(mut self) -> Result<()> {
        {
            let mut tables = self.store.tables.lock();
            for (id, order) in self.orders.drain() {
                tables.orders.insert(id, order);
            }
            for (id, balance) in self.balances.drain() {
                if let Some(user) = tables.users.get_mut(&id) {
                    user.balance = balance;
                }
            }
            if let Some(tiers) = self.tiers.take() {
                tables.tiers = tiers;
            }
            tables.config.extend(self.config.drain());
        }
        self.committed = true;
        debug!(tx = self.id, "commit");
        Ok(())
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!(tx = self.id, "rollback");
        }
        self.store.release_all(self.id);
    }
}
