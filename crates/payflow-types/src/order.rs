//! # Order: an attempted or completed transfer of value
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  settle    ┌─────────┐
//!   │ PENDING ├───────────▶│ SETTLED │
//!   └──┬───┬──┘            └─────────┘
//!      │   │ expiry sweep  ┌─────────┐
//!      │   └──────────────▶│ EXPIRED │
//!      │ operator fail     └─────────┘
//!      ▼
//!   ┌────────┐
//!   │ FAILED │
//!   └────────┘
//! ```
//!
//! Every non-pending state is terminal. `amount` never changes after
//! creation and `settled_at` is `Some` exactly when the status is `Settled`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, OrderId, PayflowError, Result, UserId};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Settled,
    Expired,
    Failed,
}

impl OrderStatus {
    /// Can an order in this status move to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Settled | Self::Expired | Self::Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// What kind of transfer an order represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Merchant-created order paid through a pay link.
    MerchantPayment,
    /// Order created by a merchant website integration.
    Online,
    /// Direct user-to-user transfer, settled on creation.
    PeerTransfer,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MerchantPayment => write!(f, "MERCHANT_PAYMENT"),
            Self::Online => write!(f, "ONLINE"),
            Self::PeerTransfer => write!(f, "PEER_TRANSFER"),
        }
    }
}

/// An order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Display name shown to the payer.
    pub name: String,
    /// The receiving user (merchant or transfer recipient).
    pub merchant: UserId,
    /// Merchant-side reference, if the merchant supplied one.
    pub merchant_order_no: Option<String>,
    /// Set when the order settles.
    pub payer: Option<UserId>,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub kind: OrderKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub remark: String,
}

impl Order {
    /// Build a new pending order. Expiry must be strictly after creation.
    pub fn new_pending(
        merchant: UserId,
        name: impl Into<String>,
        amount: Decimal,
        kind: OrderKind,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self> {
        if expires_at <= created_at {
            return Err(PayflowError::InvalidOrder {
                reason: format!("expiry {expires_at} is not after creation {created_at}"),
            });
        }
        Ok(Self {
            id: OrderId::new(),
            name: name.into(),
            merchant,
            merchant_order_no: None,
            payer: None,
            amount,
            status: OrderStatus::Pending,
            kind,
            created_at,
            expires_at,
            settled_at: None,
            remark: String::new(),
        })
    }

    /// Whether the order's validity window has closed at `now`.
    ///
    /// An order expiring exactly at `now` is still payable.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    fn transition(&mut self, target: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(PayflowError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        Ok(())
    }

    /// PENDING → SETTLED. Stamps the payer and settlement time.
    pub fn mark_settled(&mut self, payer: UserId, at: DateTime<Utc>) -> Result<()> {
        self.transition(OrderStatus::Settled)?;
        self.payer = Some(payer);
        self.settled_at = Some(at);
        Ok(())
    }

    /// PENDING → EXPIRED.
    pub fn mark_expired(&mut self) -> Result<()> {
        self.transition(OrderStatus::Expired)
    }

    /// PENDING → FAILED.
    pub fn mark_failed(&mut self) -> Result<()> {
        self.transition(OrderStatus::Failed)
    }

    /// Append a system-authored annotation, space-separated from any caller remark.
    pub fn append_system_remark(&mut self, note: &str) {
        let annotation = format!("{}: {note}", constants::SYSTEM_REMARK_PREFIX);
        if self.remark.is_empty() {
            self.remark = annotation;
        } else {
            self.remark.push(' ');
            self.remark.push_str(&annotation);
        }
    }

    /// Test helper: a pending merchant order for `amount` valid for ten minutes.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn dummy_pending(merchant: UserId, amount: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            name: "test order".to_string(),
            merchant,
            merchant_order_no: None,
            payer: None,
            amount,
            status: OrderStatus::Pending,
            kind: OrderKind::MerchantPayment,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(10),
            settled_at: None,
            remark: String::new(),
        }
    }
}
