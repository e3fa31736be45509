//! # payflow-types
//!
//! Shared types, errors, and configuration for the **Payflow** settlement engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`UserId`], [`ClientId`], [`TierLevel`]
//! - **Order model**: [`Order`], [`OrderStatus`], [`OrderKind`]
//! - **Ledger model**: [`AccountBalance`], [`UserAccount`]
//! - **Merchant registry**: [`Merchant`], [`SignKey`]
//! - **Tier model**: [`PayTier`], [`TierTable`]
//! - **Configuration**: [`EngineConfig`], [`ScorePolicy`], [`ScoreRule`]
//! - **Time**: [`Clock`], [`SystemClock`]
//! - **Errors**: [`PayflowError`] with `PF_ERR_` prefix codes
//! - **Money helpers**: [`money`]
//! - **Constants**: system-wide limits and defaults

pub mod account;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod merchant;
pub mod money;
pub mod order;
pub mod tier;

pub use account::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use merchant::*;
pub use order::*;
pub use tier::*;

// Constants and money helpers are accessed by module path
// (`payflow_types::constants::FOO`, `payflow_types::money::round_money`).
