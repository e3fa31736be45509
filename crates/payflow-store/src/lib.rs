//! # payflow-store
//!
//! **Persistence seam** for the Payflow settlement engine.
//!
//! - [`LedgerStore`] / [`StoreTx`]: the authoritative transactional store.
//!   Every ledger mutation happens inside one transaction; dropping an
//!   uncommitted transaction rolls it back.
//! - [`ScopeLockTable`]: named exclusive scopes owned by a transaction,
//!   used for row locks and advisory locks.
//! - [`KvCache`]: read-through accelerator for configuration and the
//!   reverse order-token index.
//!
//! [`MemoryStore`] and [`MemoryCache`] are complete single-process
//! implementations of both seams.

pub mod cache;
pub mod memory;
pub mod scope_lock;
pub mod store;

pub use cache::{KvCache, MemoryCache};
pub use memory::{MemoryStore, MemoryTx};
pub use scope_lock::{ScopeBusy, ScopeLockTable, TxId};
pub use store::{LedgerStore, StoreTx};
