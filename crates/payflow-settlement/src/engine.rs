//! # Settlement Engine: the order lifecycle
//!
//! Orchestrates the Tier Resolver, Order Token Codec, Daily Limit
//! Enforcer and Fee & Ledger Calculator. Every settlement attempt runs in
//! exactly one store transaction:
//!
//! ```text
//!  token ──▶ reverse index ──▶ merchant key ──▶ decode ──▶ order id
//!                                                             │
//!  BEGIN ─▶ lock order NOWAIT ─▶ now ─▶ expiry ─▶ credential ─▶ payer ≠ merchant
//!        ─▶ tier ─▶ daily limit (advisory lock) ─▶ fee split
//!        ─▶ debit payer ─▶ credit merchant ─▶ remark ─▶ SETTLED ─▶ COMMIT
//! ```
//!
//! Any error drops the transaction, which rolls back every staged write
//! and releases both the order lock and the advisory lock. The order
//! stays `pending`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use payflow_store::cache::keys;
use payflow_store::{KvCache, LedgerStore, StoreTx};
use payflow_types::constants::{
    ENGINE_NAME, MAX_MERCHANT_ORDER_NO_CHARS, MAX_ORDER_NAME_CHARS, MAX_REMARK_CHARS,
    TOKEN_INDEX_GRACE_MINUTES, VERSION,
};
use payflow_types::{
    money, ClientId, Clock, EngineConfig, ErrorClass, Merchant, Order, OrderId, OrderKind,
    PayTier, PayflowError, Result, ScoreRule, TierLevel, UserId,
};

use crate::admin::{SystemConfigAdmin, TierAdmin};
use crate::daily_limit::DailyLimitEnforcer;
use crate::expiry;
use crate::fee::{self, FeeSplit, Posting};
use crate::score_policy;
use crate::system_config::SystemConfigReader;
use crate::tier_resolver::TierResolver;
use crate::token;

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// A merchant's request to open a payable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub name: String,
    pub amount: Decimal,
    #[serde(default)]
    pub remark: String,
    pub kind: OrderKind,
    #[serde(default)]
    pub merchant_order_no: Option<String>,
}

/// A freshly created order and its payer-facing link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedOrder {
    pub order_id: OrderId,
    pub token: String,
    pub pay_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Read-only projection shown to a payer before settling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    /// The order, with `payer` filled in with the viewing user.
    pub order: Order,
    pub tier: PayTier,
    /// Settled spend of limited kinds today.
    pub daily_used: Decimal,
    /// `None` when this order is not subject to a limit.
    pub daily_remaining: Option<Decimal>,
}

/// Outcome of a successful settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementReceipt {
    pub order_id: OrderId,
    pub payer: UserId,
    pub merchant: UserId,
    pub amount: Decimal,
    pub fee: Decimal,
    pub merchant_net: Decimal,
    pub fee_rate: Decimal,
    pub tier: TierLevel,
    pub settled_at: DateTime<Utc>,
}

/// A direct user-to-user transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub payer: UserId,
    pub recipient: UserId,
    pub amount: Decimal,
    pub credential: String,
    pub remark: String,
}

// ---------------------------------------------------------------------------
// SettlementEngine
// ---------------------------------------------------------------------------

/// The settlement engine over a ledger store `S`.
pub struct SettlementEngine<S> {
    store: Arc<S>,
    cache: Arc<dyn KvCache>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    tiers: TierResolver,
    system_config: SystemConfigReader,
    daily_limit: DailyLimitEnforcer,
}

impl<S: LedgerStore> SettlementEngine<S> {
    /// Build an engine. Fails if `config` does not validate.
    pub fn new(
        store: Arc<S>,
        cache: Arc<dyn KvCache>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let daily_limit = DailyLimitEnforcer::from_config(&config)?;
        info!(
            engine = ENGINE_NAME,
            version = VERSION,
            limited_kinds = ?config.limited_kinds,
            day_offset_seconds = config.day_offset_seconds,
            "settlement engine ready"
        );
        Ok(Self {
            tiers: TierResolver::new(Arc::clone(&cache)),
            system_config: SystemConfigReader::new(Arc::clone(&cache)),
            store,
            cache,
            clock,
            config,
            daily_limit,
        })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn tier_admin(&self) -> TierAdmin<'_, S> {
        TierAdmin::new(self.store.as_ref(), Arc::clone(&self.cache))
    }

    #[must_use]
    pub fn system_config_admin(&self) -> SystemConfigAdmin<'_, S> {
        SystemConfigAdmin::new(self.store.as_ref(), Arc::clone(&self.cache))
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    /// Open a pending order for the merchant identified by `client_id`.
    ///
    /// All validation happens before a transaction opens.
    pub fn create_order(
        &self,
        client_id: &ClientId,
        request: CreateOrderRequest,
    ) -> Result<CreatedOrder> {
        let amount = money::validate_amount(request.amount)?;
        validate_order_fields(&request)?;
        if !matches!(request.kind, OrderKind::MerchantPayment | OrderKind::Online) {
            return Err(PayflowError::InvalidOrder {
                reason: format!("{} orders cannot be created by merchants", request.kind),
            });
        }

        let merchant = self
            .store
            .merchant_by_client_id(client_id)?
            .ok_or(PayflowError::MerchantNotFound)?;
        let ttl = self
            .system_config
            .order_ttl(self.store.as_ref(), request.kind)?
            .unwrap_or_else(|| self.config.default_ttl(request.kind));

        let now = self.clock.now();
        let mut order = Order::new_pending(
            merchant.user_id,
            request.name.trim(),
            amount,
            request.kind,
            now,
            now + ttl,
        )?;
        order.remark = request.remark;
        order.merchant_order_no = request.merchant_order_no;

        let mut tx = self.store.begin()?;
        tx.insert_order(&order)?;
        let token = token::encode(&merchant.sign_key, order.id)?;
        self.cache.set(
            &keys::order_token(&token),
            merchant.user_id.to_string(),
            Some(ttl + Duration::minutes(TOKEN_INDEX_GRACE_MINUTES)),
        )?;
        tx.commit()?;

        info!(
            order_id = %order.id,
            merchant = %merchant.user_id,
            amount = %order.amount,
            kind = %order.kind,
            expires_at = %order.expires_at,
            "order created"
        );
        Ok(CreatedOrder {
            order_id: order.id,
            pay_url: token::pay_link(&self.config.pay_url, &token),
            token,
            expires_at: order.expires_at,
        })
    }

    // -----------------------------------------------------------------------
    // Resolve / view
    // -----------------------------------------------------------------------

    /// Recover the order id and minting merchant from a token.
    ///
    /// Every failure is reported as [`PayflowError::OrderNotFound`] or
    /// [`PayflowError::TokenInvalid`], which present identically.
    fn locate(&self, token: &str) -> Result<(OrderId, Merchant)> {
        let merchant_id = self
            .cache
            .get(&keys::order_token(token))?
            .and_then(|raw| UserId::parse(&raw))
            .ok_or(PayflowError::OrderNotFound)?;
        let merchant = self
            .store
            .merchant(merchant_id)?
            .ok_or(PayflowError::OrderNotFound)?;
        let order_id = token::decode(&merchant.sign_key, token)?;
        Ok((order_id, merchant))
    }

    /// Load the pending order a token refers to.
    ///
    /// # Errors
    /// - [`PayflowError::OrderNotFound`] / [`PayflowError::TokenInvalid`]
    ///   for unknown, foreign, tampered or no-longer-pending tokens
    /// - [`PayflowError::OrderExpired`] if the pending order is past expiry
    pub fn resolve(&self, token: &str) -> Result<Order> {
        let (order_id, merchant) = self.locate(token)?;
        let order = self
            .store
            .order(order_id)?
            .filter(|o| o.merchant == merchant.user_id && !o.status.is_terminal())
            .ok_or(PayflowError::OrderNotFound)?;
        if order.is_expired_at(self.clock.now()) {
            return Err(PayflowError::OrderExpired(order.id));
        }
        Ok(order)
    }

    /// Read-only view of an order for `payer`, with the payer's tier and
    /// today's limit usage.
    pub fn get_order(&self, token: &str, payer: UserId) -> Result<OrderView> {
        let mut order = self.resolve(token)?;
        let account = self
            .store
            .user(payer)?
            .ok_or(PayflowError::UserNotFound(payer))?;
        let tier = self.tiers.resolve(self.store.as_ref(), account.balance.score)?;

        let daily_used = {
            let mut tx = self.store.begin()?;
            self.daily_limit
                .spent_today(&mut tx, payer, self.clock.now())?
        };
        let daily_remaining = if self.daily_limit.applies_to(order.kind) {
            tier.effective_daily_limit()
                .map(|limit| (limit - daily_used).max(Decimal::ZERO))
        } else {
            None
        };

        order.payer = Some(payer);
        Ok(OrderView {
            order,
            tier,
            daily_used,
            daily_remaining,
        })
    }

    // -----------------------------------------------------------------------
    // Settle
    // -----------------------------------------------------------------------

    /// Settle the order behind `token`, paid by `payer`.
    pub fn settle(
        &self,
        token: &str,
        payer: UserId,
        credential: &str,
    ) -> Result<SettlementReceipt> {
        self.try_settle(token, payer, credential)
            .inspect_err(|e| log_rejection("settle", payer, e))
    }

    fn try_settle(
        &self,
        token: &str,
        payer: UserId,
        credential: &str,
    ) -> Result<SettlementReceipt> {
        let (order_id, merchant) = self.locate(token)?;

        let mut tx = self.store.begin()?;
        let mut order = tx
            .lock_pending_order_nowait(order_id)?
            .filter(|o| o.merchant == merchant.user_id)
            .ok_or(PayflowError::OrderNotFound)?;

        // Expiry is judged at lock time, not request time.
        let now = self.clock.now();
        if order.is_expired_at(now) {
            return Err(PayflowError::OrderExpired(order.id));
        }

        let account = tx.user(payer)?.ok_or(PayflowError::UserNotFound(payer))?;
        verify_credential(&account.pay_key, credential)?;
        if payer == order.merchant {
            return Err(PayflowError::CannotPayOwnOrder);
        }

        let tier = self.tiers.resolve(self.store.as_ref(), account.balance.score)?;
        if self.daily_limit.applies_to(order.kind) {
            self.daily_limit
                .authorize(&mut tx, payer, order.amount, &tier, now)?;
        }

        let split = FeeSplit::compute(order.amount, tier.fee_rate);
        let posting = Posting {
            payer,
            receiver: order.merchant,
            amount: order.amount,
            split,
            payer_score: score_policy::accrue(self.config.score_policy.payer, order.amount, &tier)?,
            receiver_score: self.receiver_score(&mut tx, order.merchant, split.net)?,
        };
        fee::post(&mut tx, &posting)?;

        order.append_system_remark(&fee::fee_remark(&tier));
        order.mark_settled(payer, now)?;
        tx.save_order(&order)?;
        tx.commit()?;

        info!(
            order_id = %order.id,
            %payer,
            merchant = %order.merchant,
            amount = %order.amount,
            fee = %split.fee,
            net = %split.net,
            tier = %tier.level,
            "order settled"
        );
        Ok(SettlementReceipt {
            order_id: order.id,
            payer,
            merchant: order.merchant,
            amount: order.amount,
            fee: split.fee,
            merchant_net: split.net,
            fee_rate: tier.fee_rate,
            tier: tier.level,
            settled_at: now,
        })
    }

    /// Score credited to the receiving side under the merchant rule.
    fn receiver_score<T: StoreTx>(
        &self,
        tx: &mut T,
        receiver: UserId,
        received: Decimal,
    ) -> Result<i64> {
        let rule = self.config.score_policy.merchant;
        match rule {
            ScoreRule::None => Ok(0),
            ScoreRule::RoundedAmount => money::round_score(received),
            ScoreRule::TierRate => {
                let account = tx
                    .user(receiver)?
                    .ok_or(PayflowError::UserNotFound(receiver))?;
                let tier = self.tiers.resolve(self.store.as_ref(), account.balance.score)?;
                score_policy::accrue(rule, received, &tier)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transfer
    // -----------------------------------------------------------------------

    /// Move funds directly between two users, recorded as a settled
    /// peer-transfer order. No fee is charged.
    pub fn transfer(&self, request: TransferRequest) -> Result<SettlementReceipt> {
        let payer = request.payer;
        self.try_transfer(request)
            .inspect_err(|e| log_rejection("transfer", payer, e))
    }

    fn try_transfer(&self, request: TransferRequest) -> Result<SettlementReceipt> {
        let amount = money::validate_amount(request.amount)?;
        if request.remark.chars().count() > MAX_REMARK_CHARS {
            return Err(PayflowError::InvalidOrder {
                reason: format!("remark exceeds {MAX_REMARK_CHARS} characters"),
            });
        }
        if request.payer == request.recipient {
            return Err(PayflowError::CannotTransferToSelf);
        }

        let mut tx = self.store.begin()?;
        let account = tx
            .user(request.payer)?
            .ok_or(PayflowError::UserNotFound(request.payer))?;
        verify_credential(&account.pay_key, &request.credential)?;
        let recipient = tx
            .user(request.recipient)?
            .ok_or(PayflowError::UserNotFound(request.recipient))?;

        let now = self.clock.now();
        let tier = self.tiers.resolve(self.store.as_ref(), account.balance.score)?;
        if self.daily_limit.applies_to(OrderKind::PeerTransfer) {
            self.daily_limit
                .authorize(&mut tx, request.payer, amount, &tier, now)?;
        }

        let split = FeeSplit::fee_free(amount);
        let posting = Posting {
            payer: request.payer,
            receiver: recipient.id,
            amount,
            split,
            payer_score: score_policy::accrue(self.config.score_policy.payer, amount, &tier)?,
            receiver_score: self.receiver_score(&mut tx, recipient.id, amount)?,
        };
        fee::post(&mut tx, &posting)?;

        let mut order = Order::new_pending(
            recipient.id,
            format!("transfer to {}", recipient.username),
            amount,
            OrderKind::PeerTransfer,
            now,
            now + self.config.default_ttl(OrderKind::PeerTransfer),
        )?;
        order.remark = request.remark;
        order.mark_settled(request.payer, now)?;
        tx.insert_order(&order)?;
        tx.commit()?;

        info!(
            order_id = %order.id,
            payer = %request.payer,
            recipient = %recipient.id,
            %amount,
            "transfer settled"
        );
        Ok(SettlementReceipt {
            order_id: order.id,
            payer: request.payer,
            merchant: recipient.id,
            amount,
            fee: Decimal::ZERO,
            merchant_net: amount,
            fee_rate: Decimal::ZERO,
            tier: tier.level,
            settled_at: now,
        })
    }

    // -----------------------------------------------------------------------
    // Expiry and failure
    // -----------------------------------------------------------------------

    /// Flip every pending order past its expiry to `expired`, skipping
    /// rows held by an in-flight settlement. Returns how many flipped.
    pub fn sweep_expired(&self) -> Result<usize> {
        expiry::sweep_expired(self.store.as_ref(), self.clock.now())
    }

    /// Operator transition of a pending order to `failed`.
    pub fn fail_order(&self, order_id: OrderId, reason: &str) -> Result<Order> {
        expiry::fail_order(self.store.as_ref(), order_id, reason)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_order_fields(request: &CreateOrderRequest) -> Result<()> {
    let name_len = request.name.trim().chars().count();
    if name_len == 0 || name_len > MAX_ORDER_NAME_CHARS {
        return Err(PayflowError::InvalidOrder {
            reason: format!("name must be 1 to {MAX_ORDER_NAME_CHARS} characters"),
        });
    }
    if request.remark.chars().count() > MAX_REMARK_CHARS {
        return Err(PayflowError::InvalidOrder {
            reason: format!("remark exceeds {MAX_REMARK_CHARS} characters"),
        });
    }
    if let Some(no) = &request.merchant_order_no {
        if no.is_empty() || no.chars().count() > MAX_MERCHANT_ORDER_NO_CHARS {
            return Err(PayflowError::InvalidOrder {
                reason: format!(
                    "merchant order number must be 1 to {MAX_MERCHANT_ORDER_NO_CHARS} characters"
                ),
            });
        }
    }
    Ok(())
}

/// Constant-time comparison of the stored pay key against the supplied one.
fn verify_credential(stored: &str, supplied: &str) -> Result<()> {
    if supplied.is_empty() || !bool::from(stored.as_bytes().ct_eq(supplied.as_bytes())) {
        return Err(PayflowError::CredentialMismatch);
    }
    Ok(())
}

fn log_rejection(op: &str, payer: UserId, err: &PayflowError) {
    match err.class() {
        ErrorClass::Integrity | ErrorClass::Internal => {
            error!(op, %payer, error = %err, "request failed");
        }
        ErrorClass::Transient => debug!(op, %payer, error = %err, "request contended"),
        ErrorClass::BusinessRule => warn!(op, %payer, error = %err, "request rejected"),
        ErrorClass::Validation | ErrorClass::StateConflict => {
            debug!(op, %payer, error = %err, "request rejected");
        }
    }
}
