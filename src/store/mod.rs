//! Holding Store and Movement Log
//!
//! Every mutation happens inside a [`UnitOfWork`] handed out by
//! [`LedgerStore::begin`]. The unit of work is passed explicitly to each
//! operation; nothing is visible to other readers until `commit`.
//!
//! # Safety Invariants
//!
//! 1. **Single Mutation Point**: balances change only via `apply_delta`
//! 2. **Conditional Update**: `apply_delta` checks version and non-negativity
//!    and writes in one atomic step
//! 3. **Append Only**: movements are appended PENDING and flipped to a
//!    terminal status at most once
//! 4. **No Partial Visibility**: a dropped or rolled back unit of work leaves
//!    no trace

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core_types::{Asset, HoldingId, MovementId, OwnerId};
use crate::models::Holding;
use crate::movement::{Movement, MovementStatus};

/// Balance side of a unit of work
#[async_trait]
pub trait HoldingStore: Send {
    /// Whether `id` is a registered owner, read within this unit of work
    async fn owner_exists(&mut self, id: OwnerId) -> Result<bool, StoreError>;

    /// Read a holding as seen by this unit of work
    async fn get(&mut self, id: HoldingId) -> Result<Holding, StoreError>;

    /// Acquire the exclusive lock on a holding for the rest of the unit of work.
    ///
    /// Bounded by the store's lock timeout (`StoreError::LockTimeout`).
    async fn lock(&mut self, id: HoldingId) -> Result<Holding, StoreError>;

    /// Conditionally add `delta` to the balance.
    ///
    /// Refuses with `Conflict` if the stored version is not `expected_version`
    /// with `InsufficientFunds` if the balance would go negative and with
    /// `Overflow` if it would not fit a `Decimal`. On refusal nothing is applied.
    async fn apply_delta(
        &mut self,
        id: HoldingId,
        delta: Decimal,
        expected_version: i64,
    ) -> Result<Holding, StoreError>;
}

/// Ledger entry side of a unit of work
#[async_trait]
pub trait MovementLog: Send {
    /// Append a PENDING movement
    async fn append(&mut self, movement: &Movement) -> Result<MovementId, StoreError>;

    /// Flip a movement to COMPLETED or FAILED.
    ///
    /// Same terminal status twice is a no-op; a different status after the
    /// first terminal transition is `AlreadyTerminal`.
    async fn mark_terminal(
        &mut self,
        id: MovementId,
        status: MovementStatus,
        reason: Option<&str>,
    ) -> Result<Movement, StoreError>;
}

/// One atomic, all-or-nothing group of store operations
#[async_trait]
pub trait UnitOfWork: HoldingStore + MovementLog {
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard all staged writes and release locks
    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Backing store for holdings, owners and movements
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Committed view of a holding
    async fn holding(&self, id: HoldingId) -> Result<Holding, StoreError>;

    /// Committed view of a movement (always terminal)
    async fn movement(&self, id: MovementId) -> Result<Movement, StoreError>;

    async fn register_owner(&self, id: OwnerId) -> Result<(), StoreError>;

    /// Open an empty holding; the owner must already be registered
    async fn open_holding(&self, owner_id: OwnerId, asset: Asset) -> Result<Holding, StoreError>;
}
