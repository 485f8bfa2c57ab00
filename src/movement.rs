//! Movement records
//!
//! A movement is one logical unit of value motion. It is appended PENDING inside
//! the orchestrator's unit of work and transitions exactly once to COMPLETED or
//! FAILED. Status and kind ids are stable for SMALLINT storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_types::{Asset, HoldingId, MovementId, OwnerId};

/// Kind of value motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum MovementKind {
    /// Same-asset move between two holdings
    Transfer = 1,
    /// External inflow into one holding
    Deposit = 2,
    /// External outflow from one holding
    Withdraw = 3,
    /// Cross-asset move priced by the rate oracle
    Exchange = 4,
}

impl MovementKind {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(MovementKind::Transfer),
            2 => Some(MovementKind::Deposit),
            3 => Some(MovementKind::Withdraw),
            4 => Some(MovementKind::Exchange),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Transfer => "TRANSFER",
            MovementKind::Deposit => "DEPOSIT",
            MovementKind::Withdraw => "WITHDRAW",
            MovementKind::Exchange => "EXCHANGE",
        }
    }

    /// Whether the movement debits a source holding
    pub fn has_source(&self) -> bool {
        !matches!(self, MovementKind::Deposit)
    }

    /// Whether the movement credits a destination holding
    pub fn has_dest(&self) -> bool {
        !matches!(self, MovementKind::Withdraw)
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Movement status
///
/// Terminal states: COMPLETED (10), FAILED (-10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum MovementStatus {
    Pending = 0,
    Completed = 10,
    Failed = -10,
}

impl MovementStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, MovementStatus::Completed | MovementStatus::Failed)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(MovementStatus::Pending),
            10 => Some(MovementStatus::Completed),
            -10 => Some(MovementStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Pending => "PENDING",
            MovementStatus::Completed => "COMPLETED",
            MovementStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger entry for one movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub kind: MovementKind,
    pub status: MovementStatus,
    /// Identity that requested the movement
    pub owner_id: OwnerId,
    pub source_holding: Option<HoldingId>,
    pub dest_holding: Option<HoldingId>,
    pub source_asset: Asset,
    pub dest_asset: Asset,
    pub source_amount: Decimal,
    /// Always `source_amount * rate`
    pub dest_amount: Decimal,
    /// Frozen at pricing time; 1 for same-asset movements
    pub rate: Decimal,
    /// Abort reason, set only on FAILED records
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Movement {
    /// Build a PENDING movement priced at `rate`.
    ///
    /// `None` when `source_amount * rate` does not fit a `Decimal`.
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        id: MovementId,
        kind: MovementKind,
        owner_id: OwnerId,
        source_holding: Option<HoldingId>,
        dest_holding: Option<HoldingId>,
        source_asset: Asset,
        dest_asset: Asset,
        source_amount: Decimal,
        rate: Decimal,
    ) -> Option<Self> {
        let dest_amount = source_amount.checked_mul(rate)?.normalize();
        Some(Self {
            id,
            kind,
            status: MovementStatus::Pending,
            owner_id,
            source_holding,
            dest_holding,
            source_asset,
            dest_asset,
            source_amount,
            dest_amount,
            rate,
            failure_reason: None,
            created_at: Utc::now(),
            completed_at: None,
        })
    }

    /// Apply a terminal transition in place.
    ///
    /// Returns `Ok(false)` when the record already holds `status` (no-op),
    /// `Ok(true)` when it moved, and `Err(current)` when it is already terminal
    /// with a different status or `status` is not terminal.
    pub fn transition_to(
        &mut self,
        status: MovementStatus,
        reason: Option<&str>,
    ) -> Result<bool, MovementStatus> {
        if !status.is_terminal() {
            return Err(self.status);
        }
        if self.status == status {
            return Ok(false);
        }
        if self.status.is_terminal() {
            return Err(self.status);
        }

        self.status = status;
        self.completed_at = Some(Utc::now());
        if status == MovementStatus::Failed {
            self.failure_reason = reason.map(str::to_string);
        }
        Ok(true)
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Movement[{}] {} {} {} -> {} {} @ {} state={}",
            self.id,
            self.kind,
            self.source_amount,
            self.source_asset,
            self.dest_amount,
            self.dest_asset,
            self.rate,
            self.status
        )
    }
}
