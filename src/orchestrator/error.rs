//! Ledger error types
//!
//! Caller-facing error taxonomy. Validation errors are raised before any
//! mutation; `Conflict`, `LockTimeout` and `StoreUnavailable` are transient and
//! safe to resubmit.

use thiserror::Error;

use crate::core_types::{Asset, HoldingId, MovementId, OwnerId};
use crate::oracle::OracleError;
use crate::store::StoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Validation Errors ===
    #[error("Holding not found: {0}")]
    HoldingNotFound(HoldingId),

    #[error("Owner not found: {0}")]
    OwnerNotFound(OwnerId),

    #[error("Holding {holding} is not owned by {owner}")]
    OwnershipMismatch { holding: HoldingId, owner: OwnerId },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Asset mismatch: {source_asset} -> {dest_asset}")]
    AssetMismatch {
        source_asset: Asset,
        dest_asset: Asset,
    },

    // === Execution Errors ===
    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Rate unavailable: {0}")]
    RateUnavailable(String),

    #[error("Cancelled before balances were touched")]
    Cancelled,

    // === Transient Errors ===
    #[error("Timed out waiting for holding lock")]
    LockTimeout,

    #[error("Concurrent update conflict")]
    Conflict,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // === Lookup / System Errors ===
    #[error("Movement not found: {0}")]
    MovementNotFound(MovementId),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Stable error code for callers
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::HoldingNotFound(_) => "HOLDING_NOT_FOUND",
            LedgerError::OwnerNotFound(_) => "OWNER_NOT_FOUND",
            LedgerError::OwnershipMismatch { .. } => "OWNERSHIP_MISMATCH",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::AssetMismatch { .. } => "ASSET_MISMATCH",
            LedgerError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            LedgerError::RateUnavailable(_) => "RATE_UNAVAILABLE",
            LedgerError::Cancelled => "CANCELLED",
            LedgerError::LockTimeout => "LOCK_TIMEOUT",
            LedgerError::Conflict => "CONFLICT",
            LedgerError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            LedgerError::MovementNotFound(_) => "MOVEMENT_NOT_FOUND",
            LedgerError::Internal(_) => "INTERNAL",
        }
    }

    /// Safe to resubmit the identical request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Conflict | LedgerError::LockTimeout | LedgerError::StoreUnavailable(_)
        )
    }

    /// Detected before any lock or mutation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::HoldingNotFound(_)
                | LedgerError::OwnerNotFound(_)
                | LedgerError::OwnershipMismatch { .. }
                | LedgerError::InvalidAmount(_)
                | LedgerError::AssetMismatch { .. }
        )
    }
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OwnerNotFound(owner) => LedgerError::OwnerNotFound(owner),
            StoreError::Conflict { .. } => LedgerError::Conflict,
            StoreError::InsufficientFunds => LedgerError::InsufficientFunds,
            StoreError::Overflow => LedgerError::InvalidAmount("balance would overflow".into()),
            StoreError::LockTimeout => LedgerError::LockTimeout,
            StoreError::Unavailable(msg) => LedgerError::StoreUnavailable(msg),
            StoreError::NotFound | StoreError::AlreadyTerminal(_) | StoreError::Internal(_) => {
                LedgerError::Internal(e.to_string())
            }
        }
    }
}

impl From<OracleError> for LedgerError {
    fn from(e: OracleError) -> Self {
        LedgerError::RateUnavailable(e.to_string())
    }
}
