//! End-to-end tests of the settlement engine over the in-memory store.
//!
//! They drive the full order lifecycle: create → resolve → settle, with
//! real concurrency where ordering matters (double settlement, same-payer
//! daily limit races) and a manual clock where time matters.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use payflow_settlement::{
    CreateOrderRequest, CreatedOrder, SettlementEngine, TransferRequest,
};
use payflow_store::cache::keys;
use payflow_store::{KvCache, LedgerStore, MemoryCache, MemoryStore, StoreTx};
use payflow_types::clock::ManualClock;
use payflow_types::*;

const PAY_KEY: &str = "246810";

fn money(units: i64, cents: i64) -> Decimal {
    Decimal::new(units * 100 + cents, 2)
}

fn tier_table(fee_rate: Decimal, daily_limit: Option<Decimal>) -> TierTable {
    TierTable::new(vec![
        PayTier::dummy(1, 0, Some(1_000_000), fee_rate, daily_limit),
        PayTier::dummy(2, 1_000_000, None, Decimal::ZERO, None),
    ])
}

/// Engine wired to an in-memory store, cache and manual clock, with one
/// registered merchant.
struct Harness {
    engine: SettlementEngine<MemoryStore>,
    store: Arc<MemoryStore>,
    cache: Arc<MemoryCache>,
    clock: Arc<ManualClock>,
    merchant: UserId,
    client: ClientId,
}

impl Harness {
    fn new(tiers: TierTable) -> Self {
        Self::with_config(tiers, EngineConfig::default())
    }

    fn with_config(tiers: TierTable, config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryStore::from_config(&config));
        let cache = Arc::new(MemoryCache::new(clock.clone()));
        store.seed_tiers(tiers);

        let merchant_account = UserAccount::new("shop", PAY_KEY);
        let merchant = merchant_account.id;
        store.insert_user(merchant_account);
        let client = ClientId::new("shop-client");
        store
            .register_merchant(Merchant::new(merchant, client.clone()))
            .unwrap();

        let engine =
            SettlementEngine::new(store.clone(), cache.clone(), clock.clone(), config).unwrap();
        Self {
            engine,
            store,
            cache,
            clock,
            merchant,
            client,
        }
    }

    fn user(&self, name: &str, available: Decimal) -> UserId {
        let mut account = UserAccount::new(name, PAY_KEY);
        account.balance = AccountBalance::with_available(available);
        let id = account.id;
        self.store.insert_user(account);
        id
    }

    fn create(&self, amount: Decimal) -> CreatedOrder {
        self.engine
            .create_order(
                &self.client,
                CreateOrderRequest {
                    name: "espresso".to_string(),
                    amount,
                    remark: String::new(),
                    kind: OrderKind::MerchantPayment,
                    merchant_order_no: None,
                },
            )
            .unwrap()
    }

    fn balance(&self, user: UserId) -> AccountBalance {
        self.store.user(user).unwrap().unwrap().balance
    }

    fn order(&self, id: OrderId) -> Order {
        self.store.order(id).unwrap().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[test]
fn settle_moves_funds_and_closes_order() {
    let h = Harness::new(tier_table(Decimal::new(5, 2), None));
    let payer = h.user("alice", money(150, 0));
    let created = h.create(money(100, 0));
    assert!(created.pay_url.ends_with(&format!("order_no={}", created.token)));
    assert!(!created.pay_url.contains(&created.order_id.to_string()));

    let receipt = h.engine.settle(&created.token, payer, PAY_KEY).unwrap();
    assert_eq!(receipt.fee, money(5, 0));
    assert_eq!(receipt.merchant_net, money(95, 0));
    assert_eq!(receipt.fee + receipt.merchant_net, receipt.amount);
    assert_eq!(receipt.tier, TierLevel(1));

    let alice = h.balance(payer);
    assert_eq!(alice.available, money(50, 0));
    assert_eq!(alice.total_paid, money(100, 0));
    assert_eq!(alice.score, 100);
    let shop = h.balance(h.merchant);
    assert_eq!(shop.available, money(95, 0));
    assert_eq!(shop.total_received, money(95, 0));
    assert_eq!(shop.score, 0);

    let order = h.order(created.order_id);
    assert_eq!(order.status, OrderStatus::Settled);
    assert_eq!(order.payer, Some(payer));
    assert_eq!(order.settled_at, Some(h.clock.now()));
    assert_eq!(order.remark, "[system]: charged merchant 5% fee");

    // a settled token is no longer usable
    let err = h.engine.settle(&created.token, payer, PAY_KEY).unwrap_err();
    assert_eq!(err.public_view(), PublicError::NotFound);
    assert_eq!(h.balance(payer).available, money(50, 0));
    assert_eq!(h.store.held_lock_count(), 0);
}

#[test]
fn get_order_shows_tier_and_allowance() {
    let h = Harness::new(tier_table(Decimal::new(3, 2), Some(money(1000, 0))));
    let payer = h.user("bob", money(500, 0));
    let first = h.create(money(200, 0));
    h.engine.settle(&first.token, payer, PAY_KEY).unwrap();

    let second = h.create(money(50, 0));
    let view = h.engine.get_order(&second.token, payer).unwrap();
    assert_eq!(view.order.id, second.order_id);
    assert_eq!(view.order.payer, Some(payer));
    assert_eq!(view.order.status, OrderStatus::Pending);
    assert_eq!(view.tier.level, TierLevel(1));
    assert_eq!(view.daily_used, money(200, 0));
    assert_eq!(view.daily_remaining, Some(money(800, 0)));
    // viewing does not stamp the stored order
    assert_eq!(h.order(second.order_id).payer, None);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_double_settle_succeeds_exactly_once() {
    let h = Harness::new(tier_table(Decimal::new(1, 2), None));
    let created = h.create(money(100, 0));
    let payers: Vec<UserId> = (0..8)
        .map(|i| h.user(&format!("payer-{i}"), money(1000, 0)))
        .collect();
    let barrier = Barrier::new(payers.len());

    let results: Vec<Result<_>> = thread::scope(|s| {
        let handles: Vec<_> = payers
            .iter()
            .map(|payer| {
                let (engine, barrier, token) = (&h.engine, &barrier, &created.token);
                s.spawn(move || {
                    barrier.wait();
                    engine.settle(token, *payer, PAY_KEY)
                })
            })
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
    assert_eq!(winners.len(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                err,
                PayflowError::LockContention { .. } | PayflowError::OrderNotFound
            ),
            "unexpected {err}"
        );
    }

    let shop = h.balance(h.merchant);
    assert_eq!(shop.available, money(99, 0));
    let total_paid: Decimal = payers.iter().map(|p| h.balance(*p).total_paid).sum();
    assert_eq!(total_paid, money(100, 0));
    assert_eq!(h.store.held_lock_count(), 0);
}

#[test]
fn concurrent_same_payer_cannot_jointly_exceed_limit() {
    let h = Harness::new(tier_table(Decimal::ZERO, Some(money(1000, 0))));
    let payer = h.user("carol", money(5000, 0));
    let orders = [h.create(money(600, 0)), h.create(money(600, 0))];
    let barrier = Barrier::new(orders.len());

    let results: Vec<Result<_>> = thread::scope(|s| {
        let handles: Vec<_> = orders
            .iter()
            .map(|created| {
                let (engine, barrier) = (&h.engine, &barrier);
                s.spawn(move || {
                    barrier.wait();
                    engine.settle(&created.token, payer, PAY_KEY)
                })
            })
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(PayflowError::DailyLimitExceeded { .. })
    )));
    assert_eq!(h.balance(payer).total_paid, money(600, 0));
}

#[test]
fn configured_lock_timeout_surfaces_as_try_again() {
    let config = EngineConfig {
        lock_timeout_ms: 40,
        ..EngineConfig::default()
    };
    let h = Harness::with_config(tier_table(Decimal::ZERO, None), config);
    let payer = h.user("rosa", money(100, 0));
    let created = h.create(money(10, 0));

    let mut other = h.store.begin().unwrap();
    other.lock_user(payer).unwrap();
    let started = std::time::Instant::now();
    let err = h.engine.settle(&created.token, payer, PAY_KEY).unwrap_err();
    assert!(matches!(err, PayflowError::LockTimeout { .. }));
    assert_eq!(err.public_view(), PublicError::TryAgain);
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
    assert_eq!(h.order(created.order_id).status, OrderStatus::Pending);

    drop(other);
    h.engine.settle(&created.token, payer, PAY_KEY).unwrap();
    assert_eq!(h.balance(payer).available, money(90, 0));
}

// ---------------------------------------------------------------------------
// Balance and limits
// ---------------------------------------------------------------------------

#[test]
fn exact_balance_settles_one_cent_short_fails() {
    let h = Harness::new(tier_table(Decimal::new(5, 2), None));

    let exact = h.user("exact", money(100, 0));
    let created = h.create(money(100, 0));
    h.engine.settle(&created.token, exact, PAY_KEY).unwrap();
    assert_eq!(h.balance(exact).available, Decimal::ZERO);

    let short = h.user("short", money(99, 99));
    let created = h.create(money(100, 0));
    let err = h.engine.settle(&created.token, short, PAY_KEY).unwrap_err();
    assert!(matches!(err, PayflowError::InsufficientBalance { .. }));
    assert_eq!(err.public_view(), PublicError::InsufficientBalance);
    assert_eq!(h.balance(short), AccountBalance::with_available(money(99, 99)));
    assert_eq!(h.order(created.order_id).status, OrderStatus::Pending);
    assert_eq!(h.order(created.order_id).remark, "");
}

#[test]
fn daily_limit_rejects_second_order_until_next_day() {
    let h = Harness::new(tier_table(Decimal::ZERO, Some(money(1000, 0))));
    let payer = h.user("dave", money(5000, 0));

    let first = h.create(money(600, 0));
    h.engine.settle(&first.token, payer, PAY_KEY).unwrap();

    let second = h.create(money(600, 0));
    let err = h.engine.settle(&second.token, payer, PAY_KEY).unwrap_err();
    assert!(matches!(
        err,
        PayflowError::DailyLimitExceeded { used, requested, .. }
            if used == money(600, 0) && requested == money(600, 0)
    ));
    assert_eq!(err.public_view(), PublicError::LimitExceeded);
    assert_eq!(h.balance(payer).total_paid, money(600, 0));
    assert_eq!(h.order(second.order_id).status, OrderStatus::Pending);

    // the window resets at midnight
    h.clock.advance(Duration::hours(14));
    let third = h.create(money(600, 0));
    h.engine.settle(&third.token, payer, PAY_KEY).unwrap();
    assert_eq!(h.balance(payer).total_paid, money(1200, 0));
}

#[test]
fn transfers_count_toward_limit_only_when_configured() {
    let config = EngineConfig {
        limited_kinds: vec![
            OrderKind::MerchantPayment,
            OrderKind::Online,
            OrderKind::PeerTransfer,
        ],
        ..EngineConfig::default()
    };
    let h = Harness::with_config(tier_table(Decimal::ZERO, Some(money(100, 0))), config);
    let payer = h.user("erin", money(500, 0));
    let friend = h.user("frank", Decimal::ZERO);

    let transfer = |amount| TransferRequest {
        payer,
        recipient: friend,
        amount,
        credential: PAY_KEY.to_string(),
        remark: "lunch".to_string(),
    };
    h.engine.transfer(transfer(money(80, 0))).unwrap();
    let err = h.engine.transfer(transfer(money(30, 0))).unwrap_err();
    assert!(matches!(err, PayflowError::DailyLimitExceeded { .. }));

    let created = h.create(money(30, 0));
    assert!(matches!(
        h.engine.settle(&created.token, payer, PAY_KEY),
        Err(PayflowError::DailyLimitExceeded { .. })
    ));
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

#[test]
fn ttl_five_minutes_settles_at_four_expires_at_six() {
    let h = Harness::new(tier_table(Decimal::ZERO, None));
    h.engine
        .system_config_admin()
        .set("merchant_order_expire_minutes", "5")
        .unwrap();
    let payer = h.user("gina", money(100, 0));

    let early = h.create(money(10, 0));
    let late = h.create(money(10, 0));
    assert_eq!(early.expires_at, h.clock.now() + Duration::minutes(5));

    h.clock.advance(Duration::minutes(4));
    h.engine.settle(&early.token, payer, PAY_KEY).unwrap();

    h.clock.advance(Duration::minutes(2));
    let err = h.engine.settle(&late.token, payer, PAY_KEY).unwrap_err();
    assert!(matches!(err, PayflowError::OrderExpired(id) if id == late.order_id));
    assert_eq!(err.public_view(), PublicError::Expired);
    assert_eq!(h.balance(payer).available, money(90, 0));
    assert_eq!(h.order(late.order_id).status, OrderStatus::Pending);

    assert!(matches!(
        h.engine.resolve(&late.token),
        Err(PayflowError::OrderExpired(_))
    ));
    assert_eq!(h.engine.sweep_expired().unwrap(), 1);
    assert_eq!(h.order(late.order_id).status, OrderStatus::Expired);
    assert_eq!(h.order(early.order_id).status, OrderStatus::Settled);
}

#[test]
fn order_expiring_exactly_now_is_payable() {
    let h = Harness::new(tier_table(Decimal::ZERO, None));
    let payer = h.user("hank", money(10, 0));
    let created = h.create(money(10, 0));
    h.clock.set(created.expires_at);
    h.engine.settle(&created.token, payer, PAY_KEY).unwrap();
}

// ---------------------------------------------------------------------------
// Token and credential failures
// ---------------------------------------------------------------------------

#[test]
fn tampered_token_never_resolves() {
    let h = Harness::new(tier_table(Decimal::ZERO, None));
    let payer = h.user("ivy", money(100, 0));
    let created = h.create(money(10, 0));

    let mut chars: Vec<char> = created.token.chars().collect();
    let mid = chars.len() / 2;
    chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    // unknown to the reverse index
    let err = h.engine.settle(&tampered, payer, PAY_KEY).unwrap_err();
    assert_eq!(err.public_view(), PublicError::NotFound);

    // known to the index but failing authentication
    h.cache
        .set(&keys::order_token(&tampered), h.merchant.to_string(), None)
        .unwrap();
    let err = h.engine.settle(&tampered, payer, PAY_KEY).unwrap_err();
    assert!(matches!(err, PayflowError::TokenInvalid));
    assert_eq!(err.public_view(), PublicError::NotFound);

    assert_eq!(h.balance(payer).available, money(100, 0));
    assert_eq!(h.order(created.order_id).status, OrderStatus::Pending);
}

#[test]
fn wrong_credential_looks_like_not_found() {
    let h = Harness::new(tier_table(Decimal::ZERO, None));
    let payer = h.user("jack", money(100, 0));
    let created = h.create(money(10, 0));
    let err = h.engine.settle(&created.token, payer, "000000").unwrap_err();
    assert!(matches!(err, PayflowError::CredentialMismatch));
    assert_eq!(err.public_view(), PublicError::NotFound);
    assert_eq!(h.order(created.order_id).status, OrderStatus::Pending);
    assert_eq!(h.store.held_lock_count(), 0);
}

#[test]
fn merchant_cannot_pay_own_order() {
    let h = Harness::new(tier_table(Decimal::ZERO, None));
    let created = h.create(money(10, 0));
    assert!(matches!(
        h.engine.settle(&created.token, h.merchant, PAY_KEY),
        Err(PayflowError::CannotPayOwnOrder)
    ));
}

#[test]
fn failed_order_is_no_longer_payable() {
    let h = Harness::new(tier_table(Decimal::ZERO, None));
    let payer = h.user("kate", money(100, 0));
    let created = h.create(money(10, 0));
    let failed = h
        .engine
        .fail_order(created.order_id, "stock ran out")
        .unwrap();
    assert_eq!(failed.status, OrderStatus::Failed);
    assert!(matches!(
        h.engine.settle(&created.token, payer, PAY_KEY),
        Err(PayflowError::OrderNotFound)
    ));
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[test]
fn create_validates_before_touching_the_store() {
    let h = Harness::new(tier_table(Decimal::ZERO, None));
    let request = |amount, kind| CreateOrderRequest {
        name: "tea".to_string(),
        amount,
        remark: String::new(),
        kind,
        merchant_order_no: Some("M-1".to_string()),
    };
    for amount in [Decimal::ZERO, Decimal::new(-1, 0), Decimal::new(1001, 3)] {
        assert!(matches!(
            h.engine
                .create_order(&h.client, request(amount, OrderKind::MerchantPayment)),
            Err(PayflowError::InvalidAmount { .. })
        ));
    }
    assert!(matches!(
        h.engine
            .create_order(&h.client, request(Decimal::ONE, OrderKind::PeerTransfer)),
        Err(PayflowError::InvalidOrder { .. })
    ));
    assert!(matches!(
        h.engine.create_order(
            &ClientId::new("nobody"),
            request(Decimal::ONE, OrderKind::Online)
        ),
        Err(PayflowError::MerchantNotFound)
    ));
    assert_eq!(h.store.order_count(), 0);

    let created = h
        .engine
        .create_order(&h.client, request(Decimal::new(1500, 3), OrderKind::Online))
        .unwrap();
    let order = h.order(created.order_id);
    assert_eq!(order.amount, money(1, 50));
    assert_eq!(order.kind, OrderKind::Online);
    assert_eq!(order.merchant_order_no.as_deref(), Some("M-1"));
}

struct RefusingCache;

impl KvCache for RefusingCache {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn set(&self, key: &str, _value: String, _ttl: Option<Duration>) -> Result<()> {
        Err(PayflowError::Cache(format!("refusing {key}")))
    }

    fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

#[test]
fn cache_failure_rolls_back_creation() {
    let store = Arc::new(MemoryStore::default());
    store.seed_tiers(tier_table(Decimal::ZERO, None));
    let account = UserAccount::new("shop", PAY_KEY);
    let merchant = account.id;
    store.insert_user(account);
    let client = ClientId::new("c");
    store
        .register_merchant(Merchant::new(merchant, client.clone()))
        .unwrap();

    let engine = SettlementEngine::new(
        store.clone(),
        Arc::new(RefusingCache),
        Arc::new(SystemClock),
        EngineConfig::default(),
    )
    .unwrap();
    let err = engine
        .create_order(
            &client,
            CreateOrderRequest {
                name: "tea".to_string(),
                amount: Decimal::ONE,
                remark: String::new(),
                kind: OrderKind::MerchantPayment,
                merchant_order_no: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, PayflowError::Cache(_)));
    assert_eq!(store.order_count(), 0);
    assert_eq!(store.held_lock_count(), 0);
}

// ---------------------------------------------------------------------------
// Tiers and scores
// ---------------------------------------------------------------------------

#[test]
fn uncovered_score_is_an_internal_error() {
    let h = Harness::new(TierTable::new(vec![PayTier::dummy(
        1,
        10,
        None,
        Decimal::ZERO,
        None,
    )]));
    let payer = h.user("liam", money(100, 0));
    let created = h.create(money(10, 0));
    let err = h.engine.settle(&created.token, payer, PAY_KEY).unwrap_err();
    assert!(matches!(err, PayflowError::NoTierForScore(0)));
    assert_eq!(err.class(), ErrorClass::Integrity);
    assert_eq!(err.public_view(), PublicError::Internal);
    assert_eq!(h.order(created.order_id).status, OrderStatus::Pending);
}

#[test]
fn score_moves_payer_into_next_tier() {
    let tiers = TierTable::new(vec![
        PayTier::dummy(1, 0, Some(100), Decimal::new(5, 2), None),
        PayTier::dummy(2, 100, None, Decimal::new(1, 2), None),
    ]);
    let h = Harness::new(tiers);
    let payer = h.user("mia", money(1000, 0));

    let first = h.create(money(99, 50));
    let receipt = h.engine.settle(&first.token, payer, PAY_KEY).unwrap();
    assert_eq!(receipt.tier, TierLevel(1));
    // round(99.50) = 100
    assert_eq!(h.balance(payer).score, 100);

    let second = h.create(money(10, 0));
    let receipt = h.engine.settle(&second.token, payer, PAY_KEY).unwrap();
    assert_eq!(receipt.tier, TierLevel(2));
    assert_eq!(receipt.fee, money(0, 10));
}

#[test]
fn tier_rate_policy_credits_both_sides() {
    let config = EngineConfig {
        score_policy: ScorePolicy {
            payer: ScoreRule::TierRate,
            merchant: ScoreRule::RoundedAmount,
        },
        ..EngineConfig::default()
    };
    let mut tier = PayTier::dummy(1, 0, None, Decimal::new(10, 2), None);
    tier.score_rate = Decimal::new(50, 2);
    let h = Harness::with_config(TierTable::new(vec![tier]), config);
    let payer = h.user("noah", money(100, 0));
    let created = h.create(money(41, 0));
    h.engine.settle(&created.token, payer, PAY_KEY).unwrap();

    // 41 * 0.50 = 20.5 -> 21
    assert_eq!(h.balance(payer).score, 21);
    // net 36.90 -> 37
    assert_eq!(h.balance(h.merchant).score, 37);
}

#[test]
fn tier_admin_changes_apply_to_next_settlement() {
    let h = Harness::new(tier_table(Decimal::new(5, 2), None));
    let payer = h.user("olga", money(1000, 0));
    let first = h.create(money(100, 0));
    assert_eq!(
        h.engine.settle(&first.token, payer, PAY_KEY).unwrap().fee,
        money(5, 0)
    );

    let mut tier = h.store.tiers().unwrap().get(TierLevel(1)).unwrap().clone();
    tier.fee_rate = Decimal::new(2, 2);
    h.engine.tier_admin().update(&tier).unwrap();

    let second = h.create(money(100, 0));
    assert_eq!(
        h.engine.settle(&second.token, payer, PAY_KEY).unwrap().fee,
        money(2, 0)
    );
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

#[test]
fn transfer_moves_full_amount_and_records_order() {
    let h = Harness::new(tier_table(Decimal::new(5, 2), Some(money(50, 0))));
    let payer = h.user("pia", money(100, 0));
    let friend = h.user("quinn", Decimal::ZERO);

    let receipt = h
        .engine
        .transfer(TransferRequest {
            payer,
            recipient: friend,
            amount: money(75, 0),
            credential: PAY_KEY.to_string(),
            remark: "rent share".to_string(),
        })
        .unwrap();
    // transfers are not a limited kind by default, so the 50 limit is ignored
    assert_eq!(receipt.fee, Decimal::ZERO);
    assert_eq!(h.balance(payer).available, money(25, 0));
    assert_eq!(h.balance(friend).available, money(75, 0));
    assert_eq!(h.balance(friend).total_received, money(75, 0));

    let order = h.order(receipt.order_id);
    assert_eq!(order.kind, OrderKind::PeerTransfer);
    assert_eq!(order.status, OrderStatus::Settled);
    assert_eq!(order.payer, Some(payer));
    assert_eq!(order.merchant, friend);

    assert!(matches!(
        h.engine.transfer(TransferRequest {
            payer,
            recipient: payer,
            amount: Decimal::ONE,
            credential: PAY_KEY.to_string(),
            remark: String::new(),
        }),
        Err(PayflowError::CannotTransferToSelf)
    ));
    assert!(matches!(
        h.engine.transfer(TransferRequest {
            payer,
            recipient: friend,
            amount: money(26, 0),
            credential: PAY_KEY.to_string(),
            remark: String::new(),
        }),
        Err(PayflowError::InsufficientBalance { .. })
    ));
}
