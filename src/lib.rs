//! Holding Ledger - Atomic Transfer Engine
//!
//! Moves value between fiat accounts and crypto wallets while keeping every
//! balance non-negative and every movement all-or-nothing.
//!
//! # Modules
//!
//! - [`core_types`] - Identifiers and the asset catalogue
//! - [`models`] - Holding (account / wallet) model
//! - [`movement`] - Ledger entries and their status
//! - [`store`] - Holding store, movement log, unit of work (memory / PostgreSQL)
//! - [`oracle`] - Rate oracle client, rate table, HTTP oracle
//! - [`orchestrator`] - The transfer state machine
//! - [`notifier`] - Best-effort event publication
//! - [`config`] / [`logging`] / [`db`] - Ambient plumbing

// Core types - must be first!
pub mod core_types;

// Ledger model
pub mod models;
pub mod movement;

// Components
pub mod notifier;
pub mod oracle;
pub mod orchestrator;
pub mod store;

// Plumbing
pub mod config;
pub mod db;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{Asset, AssetKind, HoldingId, MovementId, OwnerId};
pub use models::Holding;
pub use movement::{Movement, MovementKind, MovementStatus};
pub use notifier::{EventNotifier, EventPublisher, MovementEvent};
pub use oracle::{RateOracle, RateOracleClient, RateQuote, RateTable};
pub use orchestrator::{CancelToken, LedgerError, MovementRequest, Phase, TransferOrchestrator};
pub use store::{LedgerStore, MemoryStore, PgLedgerStore, StoreError, UnitOfWork};
