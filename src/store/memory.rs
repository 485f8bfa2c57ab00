//! In-memory ledger store
//!
//! Owned, lock-guarded tables. Each holding has its own async mutex; a unit of
//! work keeps the guards of the holdings it locked and stages its writes
//! locally. `commit` publishes every staged write under one table write lock,
//! so readers see either all of a unit of work or none of it.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

use super::error::StoreError;
use super::{HoldingStore, LedgerStore, MovementLog, UnitOfWork};
use crate::core_types::{Asset, HoldingId, MovementId, OwnerId};
use crate::models::Holding;
use crate::movement::{Movement, MovementStatus};

#[derive(Default)]
struct Tables {
    owners: HashSet<OwnerId>,
    holdings: HashMap<HoldingId, Holding>,
    movements: HashMap<MovementId, Movement>,
}

/// In-memory [`LedgerStore`]
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: Arc<DashMap<HoldingId, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            locks: Arc::new(DashMap::new()),
            lock_timeout,
        }
    }

    /// Number of committed movements
    pub async fn movement_count(&self) -> usize {
        self.tables.read().await.movements.len()
    }

    /// All committed movements touching `holding`, oldest first
    pub async fn movements_for(&self, holding: HoldingId) -> Vec<Movement> {
        let tables = self.tables.read().await;
        let mut movements: Vec<Movement> = tables
            .movements
            .values()
            .filter(|m| m.source_holding == Some(holding) || m.dest_holding == Some(holding))
            .cloned()
            .collect();
        movements.sort_by_key(|m| m.id);
        movements
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnitOfWork {
            tables: self.tables.clone(),
            locks: self.locks.clone(),
            lock_timeout: self.lock_timeout,
            guards: BTreeMap::new(),
            holdings: BTreeMap::new(),
            movements: HashMap::new(),
        }))
    }

    async fn holding(&self, id: HoldingId) -> Result<Holding, StoreError> {
        self.tables
            .read()
            .await
            .holdings
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn movement(&self, id: MovementId) -> Result<Movement, StoreError> {
        self.tables
            .read()
            .await
            .movements
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn register_owner(&self, id: OwnerId) -> Result<(), StoreError> {
        self.tables.write().await.owners.insert(id);
        Ok(())
    }

    async fn open_holding(&self, owner_id: OwnerId, asset: Asset) -> Result<Holding, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.owners.contains(&owner_id) {
            return Err(StoreError::OwnerNotFound(owner_id));
        }
        let holding = Holding::open(owner_id, asset);
        tables.holdings.insert(holding.id, holding.clone());
        self.locks.insert(holding.id, Arc::new(Mutex::new(())));
        debug!(holding = %holding, "Holding opened");
        Ok(holding)
    }
}

/// Unit of work over [`MemoryStore`]
pub struct MemoryUnitOfWork {
    tables: Arc<RwLock<Tables>>,
    locks: Arc<DashMap<HoldingId, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
    guards: BTreeMap<HoldingId, OwnedMutexGuard<()>>,
    /// Staged copies of locked holdings
    holdings: BTreeMap<HoldingId, Holding>,
    /// Staged appends and transitions
    movements: HashMap<MovementId, Movement>,
}

impl MemoryUnitOfWork {
    fn discard(&mut self) {
        self.movements.clear();
        self.holdings.clear();
        // Dropping the guards releases the holding locks
        self.guards.clear();
    }

    async fn staged_movement(&mut self, id: MovementId) -> Result<&mut Movement, StoreError> {
        if !self.movements.contains_key(&id) {
            let committed = self
                .tables
                .read()
                .await
                .movements
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound)?;
            self.movements.insert(id, committed);
        }
        self.movements.get_mut(&id).ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl HoldingStore for MemoryUnitOfWork {
    async fn owner_exists(&mut self, id: OwnerId) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.owners.contains(&id))
    }

    async fn get(&mut self, id: HoldingId) -> Result<Holding, StoreError> {
        if let Some(staged) = self.holdings.get(&id) {
            return Ok(staged.clone());
        }
        self.tables
            .read()
            .await
            .holdings
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn lock(&mut self, id: HoldingId) -> Result<Holding, StoreError> {
        if let Some(staged) = self.holdings.get(&id) {
            return Ok(staged.clone());
        }

        let slot = self
            .locks
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)?;

        let guard = tokio::time::timeout(self.lock_timeout, slot.lock_owned())
            .await
            .map_err(|_| {
                warn!(holding_id = %id, "Holding lock timed out");
                StoreError::LockTimeout
            })?;

        // Read after the lock is held so the staged copy is current
        let holding = self
            .tables
            .read()
            .await
            .holdings
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        self.guards.insert(id, guard);
        self.holdings.insert(id, holding.clone());
        Ok(holding)
    }

    async fn apply_delta(
        &mut self,
        id: HoldingId,
        delta: Decimal,
        expected_version: i64,
    ) -> Result<Holding, StoreError> {
        if !self.guards.contains_key(&id) {
            self.lock(id).await?;
        }
        let holding = self.holdings.get_mut(&id).ok_or(StoreError::NotFound)?;

        if holding.version != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: holding.version,
            });
        }
        let balance = holding.balance_after(delta)?;

        holding.balance = balance;
        holding.version += 1;
        holding.updated_at = Utc::now();
        Ok(holding.clone())
    }
}

#[async_trait]
impl MovementLog for MemoryUnitOfWork {
    async fn append(&mut self, movement: &Movement) -> Result<MovementId, StoreError> {
        if movement.status != MovementStatus::Pending {
            return Err(StoreError::Internal(format!(
                "movement {} must be appended PENDING, got {}",
                movement.id, movement.status
            )));
        }
        if self.movements.contains_key(&movement.id)
            || self.tables.read().await.movements.contains_key(&movement.id)
        {
            return Err(StoreError::Internal(format!(
                "duplicate movement id {}",
                movement.id
            )));
        }
        self.movements.insert(movement.id, movement.clone());
        Ok(movement.id)
    }

    async fn mark_terminal(
        &mut self,
        id: MovementId,
        status: MovementStatus,
        reason: Option<&str>,
    ) -> Result<Movement, StoreError> {
        let movement = self.staged_movement(id).await?;
        movement
            .transition_to(status, reason)
            .map_err(StoreError::AlreadyTerminal)?;
        Ok(movement.clone())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(&mut self) -> Result<(), StoreError> {
        if let Some(pending) = self.movements.values().find(|m| !m.status.is_terminal()) {
            let id = pending.id;
            self.discard();
            return Err(StoreError::Internal(format!(
                "refusing to commit PENDING movement {}",
                id
            )));
        }

        {
            let mut tables = self.tables.write().await;
            for (id, holding) in std::mem::take(&mut self.holdings) {
                tables.holdings.insert(id, holding);
            }
            for (id, movement) in self.movements.drain() {
                tables.movements.insert(id, movement);
            }
        }
        self.guards.clear();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.discard();
        Ok(())
    }
}
