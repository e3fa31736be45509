//! Per-user ledger state.
//!
//! The balance lives on the user row. It is mutated only by the settlement
//! engine's conditional debit and unconditional credit, inside the same
//! transaction as the order status change they accompany.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Mutable ledger columns embedded on the user entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountBalance {
    /// Spendable balance. Never negative.
    pub available: Decimal,
    /// Lifetime amount received as merchant or transfer recipient.
    pub total_received: Decimal,
    /// Lifetime amount paid.
    pub total_paid: Decimal,
    /// Accumulated score used to pick the pay tier.
    pub score: i64,
}

impl AccountBalance {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: Decimal::ZERO,
            total_received: Decimal::ZERO,
            total_paid: Decimal::ZERO,
            score: 0,
        }
    }

    /// A balance holding `available` and nothing else.
    #[must_use]
    pub fn with_available(available: Decimal) -> Self {
        Self {
            available,
            ..Self::new()
        }
    }
}

impl Default for AccountBalance {
    fn default() -> Self {
        Self::new()
    }
}

/// A user row as the engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    /// Short payment password compared in constant time at settlement.
    pub pay_key: String,
    pub balance: AccountBalance,
}

impl UserAccount {
    #[must_use]
    pub fn new(username: impl Into<String>, pay_key: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            pay_key: pay_key.into(),
            balance: AccountBalance::new(),
        }
    }
}
