//! Transfer Orchestrator
//!
//! Drives one movement through VALIDATING → LOCKED → RATED → APPLIED →
//! COMMITTED inside a single unit of work. Any failure rolls the unit back;
//! from RATED on, a FAILED movement is then recorded in a fresh unit of work.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::LedgerError;
use super::phase::Phase;
use super::request::{CancelToken, MovementRequest};
use crate::config::OrchestratorConfig;
use crate::core_types::{Asset, HoldingId, MovementId, OwnerId};
use crate::models::Holding;
use crate::movement::{Movement, MovementKind, MovementStatus};
use crate::notifier::{EventNotifier, MovementEvent};
use crate::oracle::{RateOracleClient, RateQuote};
use crate::store::{LedgerStore, StoreError, UnitOfWork};

/// Why an attempt stopped
#[derive(Debug)]
struct Abort {
    phase: Phase,
    error: LedgerError,
    /// Movement as priced so far; present from RATED on
    draft: Option<Movement>,
}

impl Abort {
    fn new(phase: Phase, error: LedgerError) -> Self {
        Self {
            phase,
            error,
            draft: None,
        }
    }

    fn with_draft(phase: Phase, error: LedgerError, draft: &Movement) -> Self {
        Self {
            phase,
            error,
            draft: Some(draft.clone()),
        }
    }
}

/// Holdings resolved while VALIDATING
struct Plan {
    source: Option<Holding>,
    dest: Option<Holding>,
    source_asset: Asset,
    dest_asset: Asset,
}

impl Plan {
    /// Every involved holding, in lock order
    fn lock_order(&self) -> BTreeSet<HoldingId> {
        self.source
            .iter()
            .chain(self.dest.iter())
            .map(|h| h.id)
            .collect()
    }
}

/// Net balance change per holding; a holding on both sides gets one delta
fn net_deltas(movement: &Movement) -> BTreeMap<HoldingId, Decimal> {
    let mut deltas = BTreeMap::new();
    if let Some(source) = movement.source_holding {
        *deltas.entry(source).or_insert(Decimal::ZERO) -= movement.source_amount;
    }
    if let Some(dest) = movement.dest_holding {
        *deltas.entry(dest).or_insert(Decimal::ZERO) += movement.dest_amount;
    }
    deltas
}

fn holding_error(id: HoldingId, e: StoreError) -> LedgerError {
    match e {
        StoreError::NotFound => LedgerError::HoldingNotFound(id),
        other => other.into(),
    }
}

fn check_cancel(cancel: &CancelToken, phase: Phase) -> Result<(), Abort> {
    if phase.is_cancellable() && cancel.is_cancelled() {
        return Err(Abort::new(phase, LedgerError::Cancelled));
    }
    Ok(())
}

/// Transfer Orchestrator - atomic movement execution
pub struct TransferOrchestrator {
    store: Arc<dyn LedgerStore>,
    oracle: RateOracleClient,
    notifier: Option<EventNotifier>,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl TransferOrchestrator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        oracle: RateOracleClient,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            notifier: None,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Publish terminal movements through `notifier`
    pub fn with_notifier(mut self, notifier: EventNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub async fn transfer(
        &self,
        owner_id: OwnerId,
        source: HoldingId,
        dest: HoldingId,
        amount: Decimal,
    ) -> Result<Movement, LedgerError> {
        self.submit(MovementRequest::transfer(owner_id, source, dest, amount))
            .await
    }

    pub async fn deposit(
        &self,
        owner_id: OwnerId,
        holding: HoldingId,
        amount: Decimal,
    ) -> Result<Movement, LedgerError> {
        self.submit(MovementRequest::deposit(owner_id, holding, amount))
            .await
    }

    pub async fn withdraw(
        &self,
        owner_id: OwnerId,
        holding: HoldingId,
        amount: Decimal,
    ) -> Result<Movement, LedgerError> {
        self.submit(MovementRequest::withdraw(owner_id, holding, amount))
            .await
    }

    pub async fn exchange(
        &self,
        owner_id: OwnerId,
        source: HoldingId,
        dest: HoldingId,
        source_amount: Decimal,
    ) -> Result<Movement, LedgerError> {
        self.submit(MovementRequest::exchange(owner_id, source, dest, source_amount))
            .await
    }

    /// Committed, terminal view of a movement
    pub async fn get_movement(&self, id: MovementId) -> Result<Movement, LedgerError> {
        match self.store.movement(id).await {
            Ok(movement) => Ok(movement),
            Err(StoreError::NotFound) => Err(LedgerError::MovementNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn submit(&self, request: MovementRequest) -> Result<Movement, LedgerError> {
        self.execute(request, &CancelToken::new()).await
    }

    /// Run a movement to a terminal outcome.
    ///
    /// Transient aborts are retried up to `max_attempts` with exponential
    /// backoff. The oracle quote obtained by the first attempt is reused by
    /// later attempts of the same movement.
    pub async fn execute(
        &self,
        request: MovementRequest,
        cancel: &CancelToken,
    ) -> Result<Movement, LedgerError> {
        let mut quote: Option<RateQuote> = None;
        let mut delay = self.retry_backoff;
        let mut attempt = 1;

        loop {
            match self.attempt(&request, &mut quote, cancel).await {
                Ok(movement) => {
                    info!(
                        movement_id = %movement.id,
                        kind = %movement.kind,
                        source_amount = %movement.source_amount,
                        dest_amount = %movement.dest_amount,
                        rate = %movement.rate,
                        attempt,
                        "Movement committed"
                    );
                    self.publish(&movement);
                    return Ok(movement);
                }
                Err(abort) if abort.error.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        movement_id = %request.id(),
                        phase = %abort.phase,
                        attempt,
                        error = %abort.error,
                        "Transient abort, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(abort) => return Err(self.finish_abort(&request, abort).await),
            }
        }
    }

    /// One unit of work; rolled back on any abort
    async fn attempt(
        &self,
        request: &MovementRequest,
        quote: &mut Option<RateQuote>,
        cancel: &CancelToken,
    ) -> Result<Movement, Abort> {
        let mut uow = self
            .store
            .begin()
            .await
            .map_err(|e| Abort::new(Phase::Validating, e.into()))?;

        let result = self.run_phases(uow.as_mut(), request, quote, cancel).await;
        if let Err(abort) = &result {
            if let Err(e) = uow.rollback().await {
                warn!(movement_id = %request.id(), error = %e, "Rollback failed");
            }
            debug!(
                movement_id = %request.id(),
                phase = %Phase::Aborted,
                failed_in = %abort.phase,
                "Phase reached"
            );
        }
        result
    }

    async fn run_phases(
        &self,
        uow: &mut dyn UnitOfWork,
        request: &MovementRequest,
        quote: &mut Option<RateQuote>,
        cancel: &CancelToken,
    ) -> Result<Movement, Abort> {
        let id = request.id();

        // === VALIDATING ===
        check_cancel(cancel, Phase::Validating)?;
        let plan = self
            .validate(uow, request)
            .await
            .map_err(|e| Abort::new(Phase::Validating, e))?;
        trace_phase(id, Phase::Validating);

        // === LOCKED ===
        let mut locked: BTreeMap<HoldingId, Holding> = BTreeMap::new();
        for holding_id in plan.lock_order() {
            let holding = uow
                .lock(holding_id)
                .await
                .map_err(|e| Abort::new(Phase::Locked, holding_error(holding_id, e)))?;
            locked.insert(holding_id, holding);
        }
        trace_phase(id, Phase::Locked);
        check_cancel(cancel, Phase::Locked)?;

        // === RATED ===
        let price = |rate: Decimal| {
            Movement::pending(
                id,
                request.kind(),
                request.owner_id(),
                request.source(),
                request.dest(),
                plan.source_asset,
                plan.dest_asset,
                request.amount(),
                rate,
            )
        };
        let rate = if plan.source_asset == plan.dest_asset {
            Decimal::ONE
        } else {
            let rate = match quote.as_ref() {
                Some(cached) => cached.rate,
                None => {
                    let fresh = self
                        .oracle
                        .quote(plan.source_asset, plan.dest_asset)
                        .await
                        .map_err(|e| Abort {
                            phase: Phase::Rated,
                            error: e.into(),
                            draft: price(Decimal::ZERO),
                        })?;
                    let rate = fresh.rate;
                    *quote = Some(fresh);
                    rate
                }
            };
            trace_phase(id, Phase::Rated);
            rate
        };
        check_cancel(cancel, Phase::Rated)?;
        // Nothing is recorded for an amount that cannot be priced
        let movement = price(rate).ok_or_else(|| {
            Abort::new(
                Phase::Rated,
                LedgerError::InvalidAmount(format!(
                    "{} {} at rate {} overflows {}",
                    request.amount(),
                    plan.source_asset,
                    rate,
                    plan.dest_asset
                )),
            )
        })?;

        // === APPLIED ===
        uow.append(&movement)
            .await
            .map_err(|e| Abort::with_draft(Phase::Applied, e.into(), &movement))?;
        for (holding_id, delta) in net_deltas(&movement) {
            if delta.is_zero() {
                continue;
            }
            let expected_version = locked
                .get(&holding_id)
                .map(|h| h.version)
                .ok_or_else(|| {
                    Abort::with_draft(
                        Phase::Applied,
                        LedgerError::Internal(format!("holding {} was not locked", holding_id)),
                        &movement,
                    )
                })?;
            uow.apply_delta(holding_id, delta, expected_version)
                .await
                .map_err(|e| {
                    Abort::with_draft(Phase::Applied, holding_error(holding_id, e), &movement)
                })?;
        }
        trace_phase(id, Phase::Applied);

        // === COMMITTED ===
        let completed = uow
            .mark_terminal(id, MovementStatus::Completed, None)
            .await
            .map_err(|e| Abort::with_draft(Phase::Committed, e.into(), &movement))?;
        uow.commit()
            .await
            .map_err(|e| Abort::with_draft(Phase::Committed, e.into(), &movement))?;
        trace_phase(id, Phase::Committed);

        Ok(completed)
    }

    async fn validate(
        &self,
        uow: &mut dyn UnitOfWork,
        request: &MovementRequest,
    ) -> Result<Plan, LedgerError> {
        let kind = request.kind();
        let owner = request.owner_id();

        if kind.has_source() != request.source().is_some()
            || kind.has_dest() != request.dest().is_some()
        {
            return Err(LedgerError::Internal(format!(
                "{} request with wrong holding sides",
                kind
            )));
        }

        if !uow.owner_exists(owner).await? {
            return Err(LedgerError::OwnerNotFound(owner));
        }

        let source = match request.source() {
            Some(id) => Some(uow.get(id).await.map_err(|e| holding_error(id, e))?),
            None => None,
        };
        let dest = match request.dest() {
            Some(id) => Some(uow.get(id).await.map_err(|e| holding_error(id, e))?),
            None => None,
        };

        // Source side always belongs to the requester; the credited side only
        // for deposits and exchanges
        if let Some(holding) = &source {
            ensure_owner(holding, owner)?;
        }
        if let (Some(holding), MovementKind::Deposit | MovementKind::Exchange) = (&dest, kind) {
            ensure_owner(holding, owner)?;
        }

        let (source_asset, dest_asset) = match (&source, &dest) {
            (Some(s), Some(d)) => (s.asset, d.asset),
            (Some(s), None) => (s.asset, s.asset),
            (None, Some(d)) => (d.asset, d.asset),
            (None, None) => {
                return Err(LedgerError::Internal("movement names no holding".into()));
            }
        };

        let amount = request.amount();
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "{} must be greater than zero",
                amount
            )));
        }
        if amount.normalize().scale() > source_asset.decimals() {
            return Err(LedgerError::InvalidAmount(format!(
                "{} has more than {} decimals for {}",
                amount,
                source_asset.decimals(),
                source_asset
            )));
        }

        let mismatch = match kind {
            MovementKind::Transfer => source_asset != dest_asset,
            MovementKind::Exchange => source_asset == dest_asset,
            MovementKind::Deposit | MovementKind::Withdraw => false,
        };
        if mismatch {
            return Err(LedgerError::AssetMismatch {
                source_asset,
                dest_asset,
            });
        }

        Ok(Plan {
            source,
            dest,
            source_asset,
            dest_asset,
        })
    }

    async fn finish_abort(&self, request: &MovementRequest, abort: Abort) -> LedgerError {
        if abort.error.is_validation() {
            info!(
                movement_id = %request.id(),
                kind = %request.kind(),
                phase = %abort.phase,
                code = abort.error.code(),
                error = %abort.error,
                "Movement rejected"
            );
        } else {
            warn!(
                movement_id = %request.id(),
                kind = %request.kind(),
                phase = %abort.phase,
                code = abort.error.code(),
                error = %abort.error,
                "Movement aborted"
            );
        }

        if abort.error == LedgerError::Cancelled || !abort.phase.records_failure() {
            return abort.error;
        }
        if let Some(draft) = abort.draft {
            match self.record_failure(draft, &abort.error).await {
                Ok(failed) => self.publish(&failed),
                Err(e) => error!(
                    movement_id = %request.id(),
                    error = %e,
                    "Failed to record FAILED movement"
                ),
            }
        }
        abort.error
    }

    /// Persist `draft` as FAILED in its own unit of work
    async fn record_failure(
        &self,
        mut draft: Movement,
        reason: &LedgerError,
    ) -> Result<Movement, StoreError> {
        draft.status = MovementStatus::Pending;
        draft.completed_at = None;
        draft.failure_reason = None;
        let reason = reason.to_string();

        let mut uow = self.store.begin().await?;
        let result: Result<Movement, StoreError> = async {
            uow.append(&draft).await?;
            let failed = uow
                .mark_terminal(draft.id, MovementStatus::Failed, Some(&reason))
                .await?;
            uow.commit().await?;
            Ok(failed)
        }
        .await;

        if result.is_err() {
            if let Err(e) = uow.rollback().await {
                warn!(movement_id = %draft.id, error = %e, "Rollback failed");
            }
        }
        result
    }

    fn publish(&self, movement: &Movement) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(MovementEvent::from(movement));
        }
    }
}

fn ensure_owner(holding: &Holding, owner: OwnerId) -> Result<(), LedgerError> {
    if holding.owner_id != owner {
        return Err(LedgerError::OwnershipMismatch {
            holding: holding.id,
            owner,
        });
    }
    Ok(())
}

fn trace_phase(id: MovementId, phase: Phase) {
    debug!(movement_id = %id, phase = %phase, "Phase reached");
}
