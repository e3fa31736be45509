//! Fee & Ledger Calculator.
//!
//! The fee is computed first and rounded; the merchant's net is the
//! remainder, never rounded on its own, so `fee + net == amount` exactly.
//! Posting debits the payer conditionally and credits the receiver
//! unconditionally, both inside the caller's transaction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use payflow_store::StoreTx;
use payflow_types::money::round_money;
use payflow_types::{PayTier, PayflowError, Result, UserId};

/// How an order amount divides between platform fee and receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub fee: Decimal,
    pub net: Decimal,
}

impl FeeSplit {
    /// Split `amount` at `fee_rate`.
    #[must_use]
    pub fn compute(amount: Decimal, fee_rate: Decimal) -> Self {
        let fee = round_money(amount * fee_rate);
        Self {
            fee,
            net: amount - fee,
        }
    }

    /// The whole amount goes to the receiver.
    #[must_use]
    pub fn fee_free(amount: Decimal) -> Self {
        Self {
            fee: Decimal::ZERO,
            net: amount,
        }
    }
}

/// System annotation recording the fee percentage on a settled order.
#[must_use]
pub fn fee_remark(tier: &PayTier) -> String {
    format!("charged merchant {}% fee", tier.fee_percent())
}

/// One side-by-side ledger mutation.
#[derive(Debug, Clone, Copy)]
pub struct Posting {
    pub payer: UserId,
    pub receiver: UserId,
    pub amount: Decimal,
    pub split: FeeSplit,
    pub payer_score: i64,
    pub receiver_score: i64,
}

/// Debit the payer by the full amount and credit the receiver with the net.
///
/// Both user rows are locked in id order before either is touched, so two
/// users paying each other at once cannot each hold one row.
///
/// # Errors
/// [`PayflowError::InsufficientBalance`] if the conditional debit
/// affected no row. The caller must drop the transaction.
pub fn post<T: StoreTx>(tx: &mut T, posting: &Posting) -> Result<()> {
    let (first, second) = if posting.payer <= posting.receiver {
        (posting.payer, posting.receiver)
    } else {
        (posting.receiver, posting.payer)
    };
    tx.lock_user(first)?;
    tx.lock_user(second)?;
    if !tx.debit_if_sufficient(posting.payer, posting.amount, posting.payer_score)? {
        return Err(PayflowError::InsufficientBalance {
            needed: posting.amount,
        });
    }
    tx.credit(posting.receiver, posting.split.net, posting.receiver_score)
}
