//! In-process rate table
//!
//! Owned, lock-guarded map of `(from, to) -> rate`, seeded with the default
//! rate sheet. Updating a rate also writes its inverse.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{OracleError, RateOracle, RateQuote};
use crate::core_types::Asset;

/// Default rate sheet (units of `to` per one `from`)
pub const DEFAULT_RATES: [(Asset, Asset, Decimal); 20] = [
    (Asset::BTC, Asset::USD, dec!(43500)),
    (Asset::ETH, Asset::USD, dec!(2280.50)),
    (Asset::USDT, Asset::USD, dec!(1)),
    (Asset::BNB, Asset::USD, dec!(315.75)),
    (Asset::SOL, Asset::USD, dec!(98.30)),
    (Asset::USD, Asset::BTC, dec!(0.000023)),
    (Asset::USD, Asset::ETH, dec!(0.000438)),
    (Asset::USD, Asset::USDT, dec!(1)),
    (Asset::USD, Asset::BNB, dec!(0.003167)),
    (Asset::USD, Asset::SOL, dec!(0.010173)),
    (Asset::USD, Asset::EUR, dec!(0.92)),
    (Asset::USD, Asset::RUB, dec!(92.50)),
    (Asset::USD, Asset::GBP, dec!(0.79)),
    (Asset::EUR, Asset::USD, dec!(1.09)),
    (Asset::RUB, Asset::USD, dec!(0.0108)),
    (Asset::GBP, Asset::USD, dec!(1.27)),
    (Asset::BTC, Asset::EUR, dec!(40020)),
    (Asset::ETH, Asset::EUR, dec!(2097.66)),
    (Asset::BTC, Asset::RUB, dec!(4023750)),
    (Asset::ETH, Asset::RUB, dec!(210941.25)),
];

pub struct RateTable {
    rates: DashMap<(Asset, Asset), Decimal>,
}

impl RateTable {
    /// Empty table
    pub fn empty() -> Self {
        Self {
            rates: DashMap::new(),
        }
    }

    /// Table seeded with [`DEFAULT_RATES`]
    pub fn with_defaults() -> Self {
        let table = Self::empty();
        for (from, to, rate) in DEFAULT_RATES {
            table.rates.insert((from, to), rate);
        }
        table
    }

    /// Set `from -> to` and its inverse `to -> from`
    pub fn set_rate(&self, from: Asset, to: Asset, rate: Decimal) -> Result<(), OracleError> {
        if rate <= Decimal::ZERO || from == to {
            return Err(OracleError::InvalidRate { from, to, rate });
        }
        self.rates.insert((from, to), rate);
        if let Some(inverse) = Decimal::ONE.checked_div(rate) {
            self.rates.insert((to, from), inverse.normalize());
        }
        tracing::info!(%from, %to, %rate, "Rate updated");
        Ok(())
    }

    pub fn rate(&self, from: Asset, to: Asset) -> Option<Decimal> {
        self.rates.get(&(from, to)).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl RateOracle for RateTable {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn quote(&self, from: Asset, to: Asset) -> Result<RateQuote, OracleError> {
        let rate = self
            .rate(from, to)
            .ok_or(OracleError::NotFound { from, to })?;
        Ok(RateQuote {
            from,
            to,
            rate,
            observed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sheet() {
        let table = RateTable::with_defaults();
        assert_eq!(table.len(), DEFAULT_RATES.len());
        assert_eq!(table.rate(Asset::BTC, Asset::USD), Some(dec!(43500)));
        assert_eq!(table.rate(Asset::USD, Asset::GBP), Some(dec!(0.79)));
        assert_eq!(table.rate(Asset::SOL, Asset::BTC), None);
    }

    #[test]
    fn test_set_rate_writes_inverse() {
        let table = RateTable::empty();
        table.set_rate(Asset::EUR, Asset::GBP, dec!(0.5)).unwrap();
        assert_eq!(table.rate(Asset::EUR, Asset::GBP), Some(dec!(0.5)));
        assert_eq!(table.rate(Asset::GBP, Asset::EUR), Some(dec!(2)));
    }

    #[test]
    fn test_set_rate_rejects_non_positive() {
        let table = RateTable::empty();
        assert!(table.set_rate(Asset::EUR, Asset::GBP, dec!(0)).is_err());
        assert!(table.set_rate(Asset::EUR, Asset::GBP, dec!(-1)).is_err());
        assert!(table.set_rate(Asset::EUR, Asset::EUR, dec!(1)).is_err());
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_quote_unknown_pair() {
        let table = RateTable::with_defaults();
        let result = table.quote(Asset::BNB, Asset::SOL).await;
        assert!(matches!(result, Err(OracleError::NotFound { .. })));
    }
}
