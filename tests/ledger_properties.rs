//! Ledger properties, exercised through the public API only

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use holding_ledger::config::{NotifierConfig, OrchestratorConfig};
use holding_ledger::movement::MovementStatus;
use holding_ledger::notifier::{BroadcastPublisher, EventNotifier};
use holding_ledger::oracle::{OracleError, RateOracle, RateOracleClient, RateQuote, RateTable};
use holding_ledger::store::{HoldingStore, LedgerStore, MemoryStore, MovementLog, UnitOfWork};
use holding_ledger::{Asset, HoldingId, LedgerError, MovementId, MovementRequest, OwnerId};
use holding_ledger::{Movement, MovementKind, TransferOrchestrator};

/// Oracle that is always down
struct DownOracle;

#[async_trait]
impl RateOracle for DownOracle {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn quote(&self, _from: Asset, _to: Asset) -> Result<RateQuote, OracleError> {
        Err(OracleError::Unavailable("connection refused".into()))
    }
}

struct Ledger {
    orchestrator: Arc<TransferOrchestrator>,
    store: MemoryStore,
}

impl Ledger {
    fn new() -> Self {
        Self::with_oracle(Arc::new(RateTable::with_defaults()))
    }

    fn with_oracle(oracle: Arc<dyn RateOracle>) -> Self {
        let store = MemoryStore::new(Duration::from_secs(2));
        let orchestrator = TransferOrchestrator::new(
            Arc::new(store.clone()),
            RateOracleClient::new(oracle, Duration::from_millis(500)),
            &OrchestratorConfig::default(),
        );
        Self {
            orchestrator: Arc::new(orchestrator),
            store,
        }
    }

    async fn owner(&self) -> OwnerId {
        let owner = OwnerId::new();
        self.store.register_owner(owner).await.unwrap();
        owner
    }

    async fn funded(&self, owner: OwnerId, asset: Asset, amount: Decimal) -> HoldingId {
        let holding = self.store.open_holding(owner, asset).await.unwrap();
        if !amount.is_zero() {
            self.orchestrator
                .deposit(owner, holding.id, amount)
                .await
                .unwrap();
        }
        holding.id
    }

    async fn balance(&self, id: HoldingId) -> Decimal {
        self.store.holding(id).await.unwrap().balance
    }
}

// ========================================================================
// Scenarios
// ========================================================================

#[tokio::test]
async fn scenario_transfer_whole_balance() {
    let ledger = Ledger::new();
    let owner = ledger.owner().await;
    let a = ledger.funded(owner, Asset::USD, dec!(100)).await;
    let b = ledger.funded(owner, Asset::USD, dec!(0)).await;

    let movement = ledger
        .orchestrator
        .transfer(owner, a, b, dec!(100))
        .await
        .unwrap();

    assert_eq!(movement.status, MovementStatus::Completed);
    assert_eq!(ledger.balance(a).await, dec!(0));
    assert_eq!(ledger.balance(b).await, dec!(100));
}

#[tokio::test]
async fn scenario_exchange_btc_to_usd() {
    let ledger = Ledger::new();
    let owner = ledger.owner().await;
    let a = ledger.funded(owner, Asset::BTC, dec!(1.0)).await;
    let b = ledger.funded(owner, Asset::USD, dec!(0)).await;

    let movement = ledger
        .orchestrator
        .exchange(owner, a, b, dec!(0.5))
        .await
        .unwrap();

    assert_eq!(movement.status, MovementStatus::Completed);
    assert_eq!(movement.rate, dec!(43500));
    assert_eq!(ledger.balance(a).await, dec!(0.5));
    assert_eq!(ledger.balance(b).await, dec!(21750));
}

#[tokio::test]
async fn scenario_overdraft_withdraw() {
    let ledger = Ledger::new();
    let owner = ledger.owner().await;
    let a = ledger.funded(owner, Asset::USD, dec!(30)).await;

    let err = ledger
        .orchestrator
        .withdraw(owner, a, dec!(50))
        .await
        .unwrap_err();

    assert_eq!(err, LedgerError::InsufficientFunds);
    assert_eq!(ledger.balance(a).await, dec!(30));
    let withdrawals: Vec<Movement> = ledger
        .store
        .movements_for(a)
        .await
        .into_iter()
        .filter(|m| m.kind == MovementKind::Withdraw)
        .collect();
    assert!(
        withdrawals
            .iter()
            .all(|m| m.status == MovementStatus::Failed)
    );
}

// ========================================================================
// Properties
// ========================================================================

#[tokio::test]
async fn conservation_same_and_cross_asset() {
    let ledger = Ledger::new();
    let owner = ledger.owner().await;
    let usd_a = ledger.funded(owner, Asset::USD, dec!(500)).await;
    let usd_b = ledger.funded(owner, Asset::USD, dec!(20)).await;
    let eur = ledger.funded(owner, Asset::EUR, dec!(0)).await;

    ledger
        .orchestrator
        .transfer(owner, usd_a, usd_b, dec!(123.45))
        .await
        .unwrap();
    assert_eq!(
        ledger.balance(usd_a).await + ledger.balance(usd_b).await,
        dec!(520)
    );

    let before = ledger.balance(usd_b).await;
    let exchange = ledger
        .orchestrator
        .exchange(owner, usd_b, eur, dec!(100))
        .await
        .unwrap();
    assert_eq!(exchange.dest_amount, exchange.source_amount * exchange.rate);
    assert_eq!(before - ledger.balance(usd_b).await, exchange.source_amount);
    assert_eq!(ledger.balance(eur).await, exchange.dest_amount);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_exactly_one_wins() {
    let ledger = Ledger::new();
    let owner = ledger.owner().await;
    let a = ledger.funded(owner, Asset::USD, dec!(100)).await;

    let first = {
        let orchestrator = ledger.orchestrator.clone();
        tokio::spawn(async move { orchestrator.withdraw(owner, a, dec!(60)).await })
    };
    let second = {
        let orchestrator = ledger.orchestrator.clone();
        tokio::spawn(async move { orchestrator.withdraw(owner, a, dec!(60)).await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(LedgerError::InsufficientFunds)))
    );
    assert_eq!(ledger.balance(a).await, dec!(40));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn crossing_transfers_conserve_and_never_go_negative() {
    let ledger = Ledger::new();
    let owner = ledger.owner().await;
    let mut holdings = Vec::new();
    for _ in 0..4 {
        holdings.push(ledger.funded(owner, Asset::USDT, dec!(50)).await);
    }

    // Every pair is hit in both directions, so unordered locking would deadlock
    let mut tasks = Vec::new();
    for i in 0..48usize {
        let source = holdings[i % 4];
        let dest = holdings[(i + 1 + i / 4 % 3) % 4];
        let amount = Decimal::from(7 + (i % 5) as i64 * 6);
        let orchestrator = ledger.orchestrator.clone();
        tasks.push(tokio::spawn(async move {
            orchestrator.transfer(owner, source, dest, amount).await
        }));
    }

    for task in tasks {
        match task.await.unwrap() {
            Ok(movement) => assert_eq!(movement.status, MovementStatus::Completed),
            Err(e) => assert_eq!(e, LedgerError::InsufficientFunds),
        }
    }

    let mut total = Decimal::ZERO;
    for id in &holdings {
        let balance = ledger.balance(*id).await;
        assert!(balance >= Decimal::ZERO, "negative balance {balance}");
        total += balance;
    }
    assert_eq!(total, dec!(200));
}

#[tokio::test]
async fn oracle_failure_after_lock_changes_nothing() {
    let ledger = Ledger::with_oracle(Arc::new(DownOracle));
    let owner = ledger.owner().await;
    let a = ledger.funded(owner, Asset::ETH, dec!(2)).await;
    let b = ledger.funded(owner, Asset::USD, dec!(10)).await;

    let request = MovementRequest::exchange(owner, a, b, dec!(1));
    let id = request.id();
    let err = ledger.orchestrator.submit(request).await.unwrap_err();

    assert!(matches!(err, LedgerError::RateUnavailable(_)));
    assert_eq!(ledger.balance(a).await, dec!(2));
    assert_eq!(ledger.balance(b).await, dec!(10));
    let recorded = ledger.orchestrator.get_movement(id).await.unwrap();
    assert_eq!(recorded.status, MovementStatus::Failed);
}

#[tokio::test]
async fn terminal_status_is_immutable() {
    let store = MemoryStore::default();
    let owner = OwnerId::new();
    store.register_owner(owner).await.unwrap();
    let holding = store.open_holding(owner, Asset::SOL).await.unwrap();
    let movement = Movement::pending(
        MovementId::new(),
        MovementKind::Deposit,
        owner,
        None,
        Some(holding.id),
        Asset::SOL,
        Asset::SOL,
        dec!(3),
        Decimal::ONE,
    )
    .unwrap();

    let mut uow = store.begin().await.unwrap();
    uow.append(&movement).await.unwrap();
    uow.apply_delta(holding.id, dec!(3), holding.version)
        .await
        .unwrap();
    uow.mark_terminal(movement.id, MovementStatus::Completed, None)
        .await
        .unwrap();
    // Same status again is a no-op
    uow.mark_terminal(movement.id, MovementStatus::Completed, None)
        .await
        .unwrap();
    assert!(
        uow.mark_terminal(movement.id, MovementStatus::Failed, Some("late"))
            .await
            .is_err()
    );
    uow.commit().await.unwrap();

    assert_eq!(
        store.movement(movement.id).await.unwrap().status,
        MovementStatus::Completed
    );
}

#[tokio::test]
async fn committed_movements_reach_subscribers() {
    let store = MemoryStore::default();
    let publisher = BroadcastPublisher::new(16);
    let mut subscriber = publisher.subscribe();
    let (notifier, _delivery) = EventNotifier::spawn(
        Arc::new(publisher),
        &NotifierConfig {
            queue_size: 16,
            max_delivery_attempts: 3,
            retry_backoff_ms: 1,
        },
    );
    let orchestrator = TransferOrchestrator::new(
        Arc::new(store.clone()),
        RateOracleClient::new(
            Arc::new(RateTable::with_defaults()),
            Duration::from_millis(500),
        ),
        &OrchestratorConfig::default(),
    )
    .with_notifier(notifier);

    let owner = OwnerId::new();
    store.register_owner(owner).await.unwrap();
    let holding = store.open_holding(owner, Asset::BNB).await.unwrap();
    let movement = orchestrator
        .deposit(owner, holding.id, dec!(1.5))
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), subscriber.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.movement_id, movement.id);
    assert_eq!(event.status, MovementStatus::Completed);
    assert_eq!(event.dest_amount, dec!(1.5));
}
