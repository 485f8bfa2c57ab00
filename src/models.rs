//! Holding model
//!
//! A holding is a balance-bearing fiat account or crypto wallet. Balances are
//! exact decimals and only change through `HoldingStore::apply_delta`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_types::{Asset, AssetKind, HoldingId, OwnerId};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub id: HoldingId,
    pub owner_id: OwnerId,
    pub asset: Asset,
    /// Never negative once committed
    pub balance: Decimal,
    /// Bumped on every successful delta; used for conflict detection
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    /// Open an empty holding
    pub fn open(owner_id: OwnerId, asset: Asset) -> Self {
        let now = Utc::now();
        Self {
            id: HoldingId::new(),
            owner_id,
            asset,
            balance: Decimal::ZERO,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fiat account or crypto wallet
    pub fn kind(&self) -> AssetKind {
        self.asset.kind()
    }

    /// Balance after applying `delta`.
    ///
    /// `InsufficientFunds` if it would go negative, `Overflow` if it does not
    /// fit a `Decimal`.
    pub fn balance_after(&self, delta: Decimal) -> Result<Decimal, StoreError> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or(StoreError::Overflow)?;
        if next < Decimal::ZERO {
            return Err(StoreError::InsufficientFunds);
        }
        Ok(next)
    }
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Holding[{}] {} {} owner={} balance={} v{}",
            self.id,
            self.kind(),
            self.asset,
            self.owner_id,
            self.balance,
            self.version
        )
    }
}
