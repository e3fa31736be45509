//! # payflow-settlement
//!
//! **Settlement engine** for balance-backed merchant orders.
//!
//! ## Architecture
//!
//! [`SettlementEngine`] owns the order lifecycle and runs each settlement
//! in one store transaction, composing:
//! 1. [`TierResolver`]: score → pay tier, read through the cache
//! 2. [`token`]: encrypted, merchant-keyed order tokens for pay links
//! 3. [`DailyLimitEnforcer`]: per-payer, per-day advisory lock + spend check
//! 4. [`fee`]: exact fee / net split and the dual-sided ledger posting
//!
//! Around it sit the expiry sweep ([`expiry`]), tier and system-config
//! administration ([`admin`]) and tracing set-up ([`telemetry`]).

pub mod admin;
pub mod daily_limit;
pub mod engine;
pub mod expiry;
pub mod fee;
pub mod score_policy;
pub mod system_config;
pub mod telemetry;
pub mod tier_resolver;
pub mod token;

pub use admin::{SystemConfigAdmin, TierAdmin};
pub use daily_limit::{DailyLimitEnforcer, DailySpendKey};
pub use engine::{
    CreateOrderRequest, CreatedOrder, OrderView, SettlementEngine, SettlementReceipt,
    TransferRequest,
};
pub use fee::FeeSplit;
pub use tier_resolver::TierResolver;
