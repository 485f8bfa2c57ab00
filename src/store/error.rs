//! Store error types
//!
//! Tagged results for the holding store and movement log. Keeps the transient
//! (`Conflict`, `LockTimeout`, `Unavailable`) and permanent failures apart.

use thiserror::Error;

use crate::core_types::OwnerId;
use crate::movement::MovementStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Owner not found: {0}")]
    OwnerNotFound(OwnerId),

    #[error("Version conflict (expected v{expected}, found v{actual})")]
    Conflict { expected: i64, actual: i64 },

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Balance overflow")]
    Overflow,

    #[error("Timed out waiting for holding lock")]
    LockTimeout,

    #[error("Movement already terminal ({0})")]
    AlreadyTerminal(MovementStatus),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store internal error: {0}")]
    Internal(String),
}

/// SQLSTATE lock_not_available (raised when `lock_timeout` elapses)
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE serialization_failure
const PG_SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE deadlock_detected
const PG_DEADLOCK_DETECTED: &str = "40P01";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(PG_LOCK_NOT_AVAILABLE) => StoreError::LockTimeout,
                Some(PG_SERIALIZATION_FAILURE) | Some(PG_DEADLOCK_DETECTED) => {
                    StoreError::Conflict {
                        expected: -1,
                        actual: -1,
                    }
                }
                _ => StoreError::Internal(e.to_string()),
            },
            _ => StoreError::Internal(e.to_string()),
        }
    }
}
