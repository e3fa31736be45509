//! Terminal transitions outside settlement: the expiry sweep and operator
//! failure.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use payflow_store::{LedgerStore, StoreTx};
use payflow_types::{Order, OrderId, PayflowError, Result};

/// Orders flipped per sweep transaction.
const SWEEP_BATCH: usize = 256;

/// Flip pending orders that expired before `now` to `expired`, one batch
/// per transaction. Orders locked by an in-flight settlement are skipped
/// and left for a later sweep.
pub fn sweep_expired<S: LedgerStore>(store: &S, now: DateTime<Utc>) -> Result<usize> {
    let mut total = 0;
    loop {
        let mut tx = store.begin()?;
        let batch = tx.lock_expired_pending(now, SWEEP_BATCH)?;
        let flipped = batch.len();
        for mut order in batch {
            order.mark_expired()?;
            tx.save_order(&order)?;
            debug!(order_id = %order.id, expires_at = %order.expires_at, "order expired");
        }
        tx.commit()?;
        total += flipped;
        if flipped < SWEEP_BATCH {
            break;
        }
    }
    if total > 0 {
        info!(count = total, "expiry sweep finished");
    }
    Ok(total)
}

/// Move a pending order to `failed`, recording `reason` on its remark.
///
/// # Errors
/// - [`PayflowError::OrderNotFound`] if the order is missing or terminal
/// - [`PayflowError::LockContention`] if a settlement holds the order
pub fn fail_order<S: LedgerStore>(store: &S, order_id: OrderId, reason: &str) -> Result<Order> {
    let mut tx = store.begin()?;
    let mut order = tx
        .lock_pending_order_nowait(order_id)?
        .ok_or(PayflowError::OrderNotFound)?;
    order.append_system_remark(&format!("failed: {}", reason.trim()));
    order.mark_failed()?;
    tx.save_order(&order)?;
    tx.commit()?;
    info!(%order_id, reason, "order failed");
    Ok(order)
}
