//! Named exclusive scopes.
//!
//! A [`ScopeLockTable`] hands out exclusive ownership of keys to
//! transactions. Ownership is re-entrant for the same transaction and is
//! dropped in bulk when the transaction ends, so a scope can never outlive
//! the transaction that took it.
//!
//! Two acquisition modes mirror what a relational store offers:
//! - [`ScopeLockTable::try_acquire`]: `NOWAIT`, fail immediately if held
//! - [`ScopeLockTable::acquire`]: block until free or the timeout elapses

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Identifier of the transaction owning a scope.
pub type TxId = u64;

/// Outcome of a lock attempt that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeBusy {
    /// Held by another transaction and the caller asked not to wait.
    Held,
    /// Still held by another transaction when the timeout elapsed.
    TimedOut,
}

/// Exclusive, transaction-owned scopes keyed by `K`.
#[derive(Debug)]
pub struct ScopeLockTable<K> {
    holders: Mutex<HashMap<K, TxId>>,
    released: Condvar,
}

impl<K: Eq + Hash + Clone> ScopeLockTable<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            holders: Mutex::new(HashMap::new()),
            released: Condvar::new(),
        }
    }

    /// Take `key` for `tx` without waiting.
    pub fn try_acquire(&self, key: &K, tx: TxId) -> Result<(), ScopeBusy> {
        let mut holders = self.holders.lock();
        match holders.get(key) {
            Some(owner) if *owner != tx => Err(ScopeBusy::Held),
            Some(_) => Ok(()),
            None => {
                holders.insert(key.clone(), tx);
                Ok(())
            }
        }
    }

    /// Take `key` for `tx`, waiting up to `timeout` for the current owner
    /// to finish.
    pub fn acquire(&self, key: &K, tx: TxId, timeout: Duration) -> Result<(), ScopeBusy> {
        let deadline = Instant::now() + timeout;
        let mut holders = self.holders.lock();
        loop {
            match holders.get(key) {
                Some(owner) if *owner == tx => return Ok(()),
                Some(_) => {
                    if self.released.wait_until(&mut holders, deadline).timed_out()
                        && holders.get(key).is_some_and(|owner| *owner != tx)
                    {
                        return Err(ScopeBusy::TimedOut);
                    }
                }
                None => {
                    holders.insert(key.clone(), tx);
                    return Ok(());
                }
            }
        }
    }

    /// Give up a single scope early. No-op unless `tx` owns it.
    pub fn release(&self, key: &K, tx: TxId) {
        let mut holders = self.holders.lock();
        if holders.get(key) == Some(&tx) {
            holders.remove(key);
            self.released.notify_all();
        }
    }

    /// Drop every scope owned by `tx`.
    pub fn release_all(&self, tx: TxId) {
        let mut holders = self.holders.lock();
        let before = holders.len();
        holders.retain(|_, owner| *owner != tx);
        if holders.len() != before {
            self.released.notify_all();
        }
    }

    #[must_use]
    pub fn is_held(&self, key: &K) -> bool {
        self.holders.lock().contains_key(key)
    }

    #[must_use]
    pub fn held_count(&self) -> usize {
        self.holders.lock().len()
    }
}

impl<K: Eq + Hash + Clone> Default for ScopeLockTable<K> {
    fn default() -> Self {
        Self::new()
    }
}
