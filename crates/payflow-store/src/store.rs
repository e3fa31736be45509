//! The ledger store seam.
//!
//! [`LedgerStore`] is the authoritative relational store: orders, users
//! (with their embedded balances), merchants, pay tiers and system
//! config. Every mutation happens inside a [`StoreTx`]; dropping a
//! transaction without calling [`StoreTx::commit`] rolls it back and
//! releases every lock it holds.
//!
//! Lock semantics a backend must honour:
//!
//! | Operation | Lock | Waits? |
//! |-----------|------|--------|
//! | [`StoreTx::lock_pending_order_nowait`] | order row | no, fails with `LockContention` |
//! | [`StoreTx::lock_user`], [`StoreTx::debit_if_sufficient`], [`StoreTx::credit`] | user row | yes, up to the lock timeout |
//! | [`StoreTx::advisory_xact_lock`] | named scope | yes, up to the lock timeout |
//! | [`StoreTx::lock_expired_pending`] | order rows | no, locked rows are skipped |

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use payflow_types::{
    ClientId, Merchant, Order, OrderId, OrderKind, PayTier, Result, TierLevel, TierTable,
    UserAccount, UserId,
};

/// Authoritative store. Reads outside a transaction see committed state.
pub trait LedgerStore: Send + Sync {
    type Tx<'a>: StoreTx
    where
        Self: 'a;

    /// Open a transaction.
    fn begin(&self) -> Result<Self::Tx<'_>>;

    fn merchant_by_client_id(&self, client_id: &ClientId) -> Result<Option<Merchant>>;

    fn merchant(&self, user: UserId) -> Result<Option<Merchant>>;

    fn user(&self, id: UserId) -> Result<Option<UserAccount>>;

    fn order(&self, id: OrderId) -> Result<Option<Order>>;

    fn tiers(&self) -> Result<TierTable>;

    fn system_config(&self, key: &str) -> Result<Option<String>>;
}

/// A single unit of work against the store.
///
/// Reads inside a transaction see committed state overlaid with the
/// transaction's own staged writes.
pub trait StoreTx {
    fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// `SELECT ... WHERE id = $1 AND status = 'pending' FOR UPDATE NOWAIT`.
    ///
    /// Returns `Ok(None)` when the order is missing or no longer pending.
    ///
    /// # Errors
    /// [`payflow_types::PayflowError::LockContention`] if another
    /// transaction holds the row.
    fn lock_pending_order_nowait(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Write back an order this transaction inserted or locked.
    fn save_order(&mut self, order: &Order) -> Result<()>;

    fn user(&mut self, id: UserId) -> Result<Option<UserAccount>>;

    /// Take the transaction-scoped advisory lock `key`, blocking until it
    /// is free.
    fn advisory_xact_lock(&mut self, key: i64) -> Result<()>;

    /// Sum of settled order amounts paid by `payer`, restricted to `kinds`,
    /// with a settlement time in `[from, to)`.
    fn settled_spend(
        &mut self,
        payer: UserId,
        kinds: &[OrderKind],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal>;

    /// `SELECT ... FROM users WHERE id = $user FOR UPDATE`, blocking up to
    /// the lock timeout. Re-locking a row this transaction holds is a no-op.
    fn lock_user(&mut self, user: UserId) -> Result<()>;

    /// `UPDATE users SET available = available - $amount, total_paid = total_paid + $amount,
    /// score = score + $score WHERE id = $user AND available >= $amount`.
    ///
    /// Returns whether a row was affected.
    fn debit_if_sufficient(&mut self, user: UserId, amount: Decimal, score: i64) -> Result<bool>;

    /// Unconditional increment of available balance, lifetime received and score.
    fn credit(&mut self, user: UserId, amount: Decimal, score: i64) -> Result<()>;

    fn tiers(&mut self) -> Result<TierTable>;

    /// Insert or replace the band with `tier.level`.
    fn upsert_tier(&mut self, tier: &PayTier) -> Result<()>;

    /// Returns whether a band was removed.
    fn delete_tier(&mut self, level: TierLevel) -> Result<bool>;

    fn set_system_config(&mut self, key: &str, value: &str) -> Result<()>;

    /// Lock up to `limit` pending orders that expired before `before`,
    /// skipping rows another transaction holds (`FOR UPDATE SKIP LOCKED`).
    fn lock_expired_pending(&mut self, before: DateTime<Utc>, limit: usize) -> Result<Vec<Order>>;

    /// Apply all staged writes atomically, then release locks.
    fn commit(self) -> Result<()>
    where
        Self: Sized;
}
