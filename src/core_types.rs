//! Core types used throughout the ledger
//!
//! Identifier newtypes and the asset catalogue. Every other module builds on these.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Holding ID - identifies a fiat account or crypto wallet.
///
/// `Ord` is load-bearing: the orchestrator locks holdings in ascending id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoldingId(Uuid);

impl HoldingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for HoldingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HoldingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner ID - the identity a holding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Movement ID - ULID based, so ids sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(ulid::Ulid);

impl MovementId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for MovementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MovementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MovementId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Whether an asset is held in a fiat account or a crypto wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    Fiat,
    Crypto,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Fiat => "FIAT",
            AssetKind::Crypto => "CRYPTO",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Asset denomination of a holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    USD,
    EUR,
    RUB,
    GBP,
    BTC,
    ETH,
    USDT,
    BNB,
    SOL,
}

impl Asset {
    pub const ALL: [Asset; 9] = [
        Asset::USD,
        Asset::EUR,
        Asset::RUB,
        Asset::GBP,
        Asset::BTC,
        Asset::ETH,
        Asset::USDT,
        Asset::BNB,
        Asset::SOL,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Asset::USD => "USD",
            Asset::EUR => "EUR",
            Asset::RUB => "RUB",
            Asset::GBP => "GBP",
            Asset::BTC => "BTC",
            Asset::ETH => "ETH",
            Asset::USDT => "USDT",
            Asset::BNB => "BNB",
            Asset::SOL => "SOL",
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Asset::USD | Asset::EUR | Asset::RUB | Asset::GBP => AssetKind::Fiat,
            Asset::BTC | Asset::ETH | Asset::USDT | Asset::BNB | Asset::SOL => AssetKind::Crypto,
        }
    }

    /// Maximum fractional digits accepted for amounts in this asset
    pub fn decimals(&self) -> u32 {
        match self.kind() {
            AssetKind::Fiat => 2,
            AssetKind::Crypto => 8,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown asset: {0}")]
pub struct UnknownAsset(pub String);

impl FromStr for Asset {
    type Err = UnknownAsset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Asset::ALL
            .iter()
            .copied()
            .find(|asset| asset.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownAsset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_kind_and_decimals() {
        assert_eq!(Asset::USD.kind(), AssetKind::Fiat);
        assert_eq!(Asset::BTC.kind(), AssetKind::Crypto);
        assert_eq!(Asset::RUB.decimals(), 2);
        assert_eq!(Asset::SOL.decimals(), 8);
    }

    #[test]
    fn test_asset_from_str() {
        assert_eq!("usdt".parse::<Asset>().unwrap(), Asset::USDT);
        assert_eq!(" BTC ".parse::<Asset>().unwrap(), Asset::BTC);
        assert!("DOGE".parse::<Asset>().is_err());
    }

    #[test]
    fn test_movement_id_parse() {
        let id = MovementId::new();
        let parsed: MovementId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-ulid".parse::<MovementId>().is_err());
    }

    #[test]
    fn test_holding_id_ordering_is_total() {
        let a = HoldingId::new();
        let b = HoldingId::new();
        assert_ne!(a, b);
        assert_eq!(a.cmp(&b), a.as_uuid().cmp(&b.as_uuid()));
    }
}
