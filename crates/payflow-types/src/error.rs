//! Error types for the Payflow settlement engine.
//!
//! All errors use the `PF_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Balance / account errors
//! - 3xx: Token and credential errors
//! - 4xx: Tier and limit errors
//! - 5xx: Storage and concurrency errors
//! - 9xx: General / internal errors

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{OrderId, OrderStatus, UserId};

/// Central error enum for all Payflow operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayflowError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// The order does not exist or is no longer pending.
    #[error("PF_ERR_100: Order not found or already completed")]
    OrderNotFound,

    /// The amount is non-positive or has more than two decimal places.
    #[error("PF_ERR_101: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// The order request failed validation (name, remark, kind).
    #[error("PF_ERR_102: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// The order's expiry passed before the settlement lock was taken.
    #[error("PF_ERR_103: Order expired: {0}")]
    OrderExpired(OrderId),

    /// A status change that would move an order backwards or out of a terminal state.
    #[error("PF_ERR_104: Invalid order transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The payer is the merchant that issued the order.
    #[error("PF_ERR_105: Cannot pay your own order")]
    CannotPayOwnOrder,

    /// A peer transfer names the payer as recipient.
    #[error("PF_ERR_106: Cannot transfer to yourself")]
    CannotTransferToSelf,

    // =================================================================
    // Balance / Account Errors (2xx)
    // =================================================================
    /// The conditional debit affected no row.
    #[error("PF_ERR_200: Insufficient available balance: need {needed}")]
    InsufficientBalance { needed: Decimal },

    /// No account row for this user.
    #[error("PF_ERR_201: User not found: {0}")]
    UserNotFound(UserId),

    /// No merchant registered under the supplied client identifier.
    #[error("PF_ERR_202: Merchant not found")]
    MerchantNotFound,

    // =================================================================
    // Token / Credential Errors (3xx)
    // =================================================================
    /// The order token is malformed, tampered, or sealed under another key.
    #[error("PF_ERR_300: Invalid order token")]
    TokenInvalid,

    /// The payer's pay key did not match.
    #[error("PF_ERR_301: Payment credential mismatch")]
    CredentialMismatch,

    /// A merchant sign key was not 32 bytes of hex.
    #[error("PF_ERR_302: Invalid sign key: {reason}")]
    InvalidSignKey { reason: String },

    // =================================================================
    // Tier / Limit Errors (4xx)
    // =================================================================
    /// No tier band covers this score. The tier table is misconfigured.
    #[error("PF_ERR_400: No pay tier covers score {0}")]
    NoTierForScore(i64),

    /// A tier definition or tier table failed validation.
    #[error("PF_ERR_401: Invalid pay tier: {reason}")]
    InvalidTier { reason: String },

    /// The referenced tier does not exist.
    #[error("PF_ERR_402: Pay tier not found: {0}")]
    TierNotFound(String),

    /// Settling would push today's spend over the tier's daily limit.
    #[error("PF_ERR_403: Daily limit exceeded: limit {limit}, used {used}, requested {requested}")]
    DailyLimitExceeded {
        limit: Decimal,
        used: Decimal,
        requested: Decimal,
    },

    // =================================================================
    // Storage / Concurrency Errors (5xx)
    // =================================================================
    /// A NOWAIT row lock was already held by another transaction.
    #[error("PF_ERR_500: Resource busy, try again: {resource}")]
    LockContention { resource: String },

    /// A blocking lock was not granted within the lock timeout.
    #[error("PF_ERR_501: Lock wait timed out: {resource}")]
    LockTimeout { resource: String },

    /// The system-of-record store failed.
    #[error("PF_ERR_502: Storage error: {0}")]
    Storage(String),

    /// The key-value cache failed.
    #[error("PF_ERR_503: Cache error: {0}")]
    Cache(String),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("PF_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("PF_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, bad system config value, etc.).
    #[error("PF_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, PayflowError>;

/// Failure taxonomy used to decide rollback, retry and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Rejected before any transaction opened.
    Validation,
    /// Rejected after the transaction opened; rolled back; safe to retry.
    StateConflict,
    /// Lock contention or timeout; retry as a fresh attempt.
    Transient,
    /// Caller must change circumstances before retrying.
    BusinessRule,
    /// Configuration bug, not a user error.
    Integrity,
    /// Infrastructure failure.
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::StateConflict => write!(f, "STATE_CONFLICT"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::BusinessRule => write!(f, "BUSINESS_RULE"),
            Self::Integrity => write!(f, "INTEGRITY"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// What a caller outside the engine is allowed to learn about a failure.
///
/// Token decode failures, credential mismatches and missing orders all
/// collapse into [`PublicError::NotFound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicError {
    NotFound,
    Invalid(String),
    Expired,
    InsufficientBalance,
    LimitExceeded,
    Rejected(String),
    TryAgain,
    Internal,
}

impl fmt::Display for PublicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "order not found or already completed"),
            Self::Invalid(reason) | Self::Rejected(reason) => write!(f, "{reason}"),
            Self::Expired => write!(f, "order expired"),
            Self::InsufficientBalance => write!(f, "insufficient balance"),
            Self::LimitExceeded => write!(f, "daily limit exceeded"),
            Self::TryAgain => write!(f, "order is being processed, try again"),
            Self::Internal => write!(f, "internal error"),
        }
    }
}

impl PayflowError {
    /// Classify this error according to the engine's failure taxonomy.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidAmount { .. }
            | Self::InvalidOrder { .. }
            | Self::TokenInvalid
            | Self::InvalidSignKey { .. }
            | Self::InvalidTier { .. }
            | Self::TierNotFound(_)
            | Self::CannotTransferToSelf
            | Self::MerchantNotFound => ErrorClass::Validation,
            Self::OrderNotFound | Self::OrderExpired(_) | Self::InvalidTransition { .. } => {
                ErrorClass::StateConflict
            }
            Self::LockContention { .. } | Self::LockTimeout { .. } => ErrorClass::Transient,
            Self::InsufficientBalance { .. }
            | Self::DailyLimitExceeded { .. }
            | Self::CredentialMismatch
            | Self::CannotPayOwnOrder => ErrorClass::BusinessRule,
            Self::NoTierForScore(_) => ErrorClass::Integrity,
            Self::UserNotFound(_)
            | Self::Storage(_)
            | Self::Cache(_)
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_) => ErrorClass::Internal,
        }
    }

    /// Whether a fresh attempt may succeed without the caller changing anything.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// The externally visible form of this error.
    #[must_use]
    pub fn public_view(&self) -> PublicError {
        match self {
            Self::OrderNotFound | Self::TokenInvalid | Self::CredentialMismatch => {
                PublicError::NotFound
            }
            Self::OrderExpired(_) => PublicError::Expired,
            Self::InsufficientBalance { .. } => PublicError::InsufficientBalance,
            Self::DailyLimitExceeded { .. } => PublicError::LimitExceeded,
            Self::LockContention { .. } | Self::LockTimeout { .. } => PublicError::TryAgain,
            Self::InvalidAmount { reason } | Self::InvalidOrder { reason } => {
                PublicError::Invalid(reason.clone())
            }
            Self::CannotPayOwnOrder => PublicError::Rejected("cannot pay your own order".into()),
            Self::CannotTransferToSelf => {
                PublicError::Rejected("cannot transfer to yourself".into())
            }
            Self::MerchantNotFound => PublicError::Rejected("merchant not found".into()),
            _ => PublicError::Internal,
        }
    }
}

impl From<serde_json::Error> for PayflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
