//! Holding Ledger - demo runner
//!
//! Wires store, rate oracle, notifier and orchestrator from `config/<env>.yaml`
//! and runs a few movements end to end:
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│ Orchestrator │───▶│  Store   │    │ Notifier │
//! │  (YAML)  │    │    (FSM)     │───▶│ (UoW)    │───▶│ (events) │
//! └──────────┘    └──────┬───────┘    └──────────┘    └──────────┘
//!                        │
//!                        ▼
//!                 ┌──────────────┐
//!                 │ Rate Oracle  │
//!                 └──────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use holding_ledger::config::{AppConfig, OracleBackend, StoreBackend};
use holding_ledger::db::Database;
use holding_ledger::logging::init_logging;
use holding_ledger::notifier::{EventNotifier, LogPublisher};
use holding_ledger::oracle::{HttpRateOracle, RateOracle, RateOracleClient, RateTable};
use holding_ledger::store::{LedgerStore, MemoryStore};
use holding_ledger::{Asset, LedgerError, Movement, OwnerId, TransferOrchestrator};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new(config.store.lock_timeout()))),
        StoreBackend::Postgres => {
            let url = config
                .store
                .postgres_url
                .as_deref()
                .context("store.postgres_url missing")?;
            let db = Database::connect(url, config.store.max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.health_check().await?;
            db.migrate().await?;
            Ok(Arc::new(db.ledger_store(&config.store)))
        }
    }
}

fn build_oracle(config: &AppConfig) -> anyhow::Result<RateOracleClient> {
    let oracle: Arc<dyn RateOracle> = match config.oracle.backend {
        OracleBackend::Table => Arc::new(RateTable::with_defaults()),
        OracleBackend::Http => {
            let url = config
                .oracle
                .http_url
                .as_deref()
                .context("oracle.http_url missing")?;
            Arc::new(HttpRateOracle::new(url, config.oracle.timeout())?)
        }
    };
    Ok(RateOracleClient::new(oracle, config.oracle.timeout()))
}

fn report(scenario: &str, result: Result<Movement, LedgerError>) {
    match result {
        Ok(movement) => info!(scenario, movement = %movement, "Scenario completed"),
        Err(e) => warn!(scenario, code = e.code(), error = %e, "Scenario rejected"),
    }
}

async fn run_scenarios(orchestrator: &TransferOrchestrator) -> anyhow::Result<()> {
    let store = orchestrator.store();

    let alice = OwnerId::new();
    let bob = OwnerId::new();
    store.register_owner(alice).await?;
    store.register_owner(bob).await?;

    // Same-asset transfer of the whole balance
    let alice_usd = store.open_holding(alice, Asset::USD).await?;
    let bob_usd = store.open_holding(bob, Asset::USD).await?;
    orchestrator.deposit(alice, alice_usd.id, dec!(100)).await?;
    report(
        "transfer",
        orchestrator
            .transfer(alice, alice_usd.id, bob_usd.id, dec!(100))
            .await,
    );

    // Cross-asset exchange priced by the oracle
    let alice_btc = store.open_holding(alice, Asset::BTC).await?;
    orchestrator.deposit(alice, alice_btc.id, dec!(1.0)).await?;
    report(
        "exchange",
        orchestrator
            .exchange(alice, alice_btc.id, alice_usd.id, dec!(0.5))
            .await,
    );

    // Overdraft is refused and leaves the balance alone
    let bob_eur = store.open_holding(bob, Asset::EUR).await?;
    orchestrator.deposit(bob, bob_eur.id, dec!(30)).await?;
    report("withdraw", orchestrator.withdraw(bob, bob_eur.id, dec!(50)).await);

    for holding in [alice_usd.id, alice_btc.id, bob_usd.id, bob_eur.id] {
        let holding = store.holding(holding).await?;
        info!(holding = %holding, "Final balance");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = init_logging(&config)?;

    info!(
        env = %env,
        git_hash = env!("GIT_HASH"),
        store = ?config.store.backend,
        oracle = ?config.oracle.backend,
        "Holding ledger starting"
    );

    let store = build_store(&config).await?;
    let oracle = build_oracle(&config)?;
    let (notifier, delivery) = EventNotifier::spawn(Arc::new(LogPublisher), &config.notifier);
    let orchestrator =
        TransferOrchestrator::new(store, oracle, &config.orchestrator).with_notifier(notifier);

    run_scenarios(&orchestrator).await?;

    // Dropping the last notifier handle lets the delivery task drain
    drop(orchestrator);
    delivery.await?;
    info!("Holding ledger finished");
    Ok(())
}
