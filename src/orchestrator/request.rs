//! Movement requests and cancellation

use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core_types::{HoldingId, MovementId, OwnerId};
use crate::movement::MovementKind;

/// A requested movement, as submitted by a caller.
///
/// The id is fixed at construction so a caller can look up the outcome
/// (including a FAILED record) even when the call returns an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRequest {
    id: MovementId,
    kind: MovementKind,
    owner_id: OwnerId,
    source: Option<HoldingId>,
    dest: Option<HoldingId>,
    amount: Decimal,
}

impl MovementRequest {
    /// Same-asset move from `source` to `dest`
    pub fn transfer(owner_id: OwnerId, source: HoldingId, dest: HoldingId, amount: Decimal) -> Self {
        Self::build(MovementKind::Transfer, owner_id, Some(source), Some(dest), amount)
    }

    /// External inflow
    pub fn deposit(owner_id: OwnerId, holding: HoldingId, amount: Decimal) -> Self {
        Self::build(MovementKind::Deposit, owner_id, None, Some(holding), amount)
    }

    /// External outflow
    pub fn withdraw(owner_id: OwnerId, holding: HoldingId, amount: Decimal) -> Self {
        Self::build(MovementKind::Withdraw, owner_id, Some(holding), None, amount)
    }

    /// Cross-asset move of `source_amount` priced by the rate oracle
    pub fn exchange(
        owner_id: OwnerId,
        source: HoldingId,
        dest: HoldingId,
        source_amount: Decimal,
    ) -> Self {
        Self::build(MovementKind::Exchange, owner_id, Some(source), Some(dest), source_amount)
    }

    fn build(
        kind: MovementKind,
        owner_id: OwnerId,
        source: Option<HoldingId>,
        dest: Option<HoldingId>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: MovementId::new(),
            kind,
            owner_id,
            source,
            dest,
            amount,
        }
    }

    /// Use a caller-chosen movement id
    pub fn with_id(mut self, id: MovementId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> MovementId {
        self.id
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn source(&self) -> Option<HoldingId> {
        self.source
    }

    pub fn dest(&self) -> Option<HoldingId> {
        self.dest
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Cooperative cancellation flag, checked before APPLIED
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_request_sides() {
        let owner = OwnerId::new();
        let holding = HoldingId::new();

        let deposit = MovementRequest::deposit(owner, holding, dec!(10));
        assert_eq!(deposit.kind(), MovementKind::Deposit);
        assert_eq!(deposit.source(), None);
        assert_eq!(deposit.dest(), Some(holding));

        let withdraw = MovementRequest::withdraw(owner, holding, dec!(10));
        assert_eq!(withdraw.source(), Some(holding));
        assert_eq!(withdraw.dest(), None);
    }

    #[test]
    fn test_request_ids_are_unique_unless_pinned() {
        let owner = OwnerId::new();
        let a = MovementRequest::deposit(owner, HoldingId::new(), dec!(1));
        let b = MovementRequest::deposit(owner, HoldingId::new(), dec!(1));
        assert_ne!(a.id(), b.id());

        let pinned = MovementId::new();
        assert_eq!(b.with_id(pinned).id(), pinned);
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
