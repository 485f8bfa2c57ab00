//! Rate Oracle
//!
//! Read-only source of conversion rates between assets. The orchestrator talks
//! to it through [`RateOracleClient`], which short-circuits same-asset pairs,
//! bounds every remote call with a timeout and refuses non-positive rates.
//! A quote is valid for one movement only; nothing here caches across calls.

pub mod http;
pub mod table;

pub use http::HttpRateOracle;
pub use table::RateTable;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core_types::Asset;

/// Conversion rate observed at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    pub from: Asset,
    pub to: Asset,
    /// Units of `to` per one unit of `from`
    pub rate: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl RateQuote {
    pub fn identity(asset: Asset) -> Self {
        Self {
            from: asset,
            to: asset,
            rate: Decimal::ONE,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("No rate for {from}/{to}")]
    NotFound { from: Asset, to: Asset },

    #[error("Rate oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Rate oracle timed out")]
    Timeout,

    #[error("Invalid rate {rate} for {from}/{to}")]
    InvalidRate {
        from: Asset,
        to: Asset,
        rate: Decimal,
    },
}

/// External rate source
#[async_trait]
pub trait RateOracle: Send + Sync {
    /// Oracle name for logging
    fn name(&self) -> &'static str;

    async fn quote(&self, from: Asset, to: Asset) -> Result<RateQuote, OracleError>;
}

/// Guarded access to a [`RateOracle`]
#[derive(Clone)]
pub struct RateOracleClient {
    oracle: Arc<dyn RateOracle>,
    timeout: Duration,
}

impl RateOracleClient {
    pub fn new(oracle: Arc<dyn RateOracle>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    pub fn name(&self) -> &'static str {
        self.oracle.name()
    }

    /// Fetch a fresh quote for `from -> to`.
    ///
    /// Same-asset pairs return rate 1 without calling the oracle. A timeout,
    /// an unknown pair or a non-positive rate is an error; no fallback rate
    /// is ever substituted.
    pub async fn quote(&self, from: Asset, to: Asset) -> Result<RateQuote, OracleError> {
        if from == to {
            return Ok(RateQuote::identity(from));
        }

        let quote = tokio::time::timeout(self.timeout, self.oracle.quote(from, to))
            .await
            .map_err(|_| OracleError::Timeout)??;

        if quote.from != from || quote.to != to {
            return Err(OracleError::Unavailable(format!(
                "{} answered {}/{} for {}/{}",
                self.oracle.name(),
                quote.from,
                quote.to,
                from,
                to
            )));
        }
        if quote.rate <= Decimal::ZERO {
            return Err(OracleError::InvalidRate {
                from,
                to,
                rate: quote.rate,
            });
        }

        tracing::debug!(
            oracle = self.oracle.name(),
            %from,
            %to,
            rate = %quote.rate,
            "Rate quoted"
        );
        Ok(quote)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockOracle;
    use super::*;
    use rust_decimal_macros::dec;

    fn client(oracle: Arc<MockOracle>, timeout_ms: u64) -> RateOracleClient {
        RateOracleClient::new(oracle, Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn test_same_asset_skips_oracle() {
        let oracle = Arc::new(MockOracle::new());
        let quote = client(oracle.clone(), 100)
            .quote(Asset::ETH, Asset::ETH)
            .await
            .unwrap();
        assert_eq!(quote.rate, Decimal::ONE);
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_quote_passes_through() {
        let oracle = Arc::new(MockOracle::new().with_rate(Asset::BTC, Asset::USD, dec!(43500)));
        let quote = client(oracle.clone(), 100)
            .quote(Asset::BTC, Asset::USD)
            .await
            .unwrap();
        assert_eq!(quote.rate, dec!(43500));
        assert_eq!(oracle.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_pair() {
        let oracle = Arc::new(MockOracle::new());
        let result = client(oracle, 100).quote(Asset::SOL, Asset::RUB).await;
        assert_eq!(
            result.unwrap_err(),
            OracleError::NotFound {
                from: Asset::SOL,
                to: Asset::RUB
            }
        );
    }

    #[tokio::test]
    async fn test_slow_oracle_times_out() {
        let oracle = Arc::new(MockOracle::new().with_rate(Asset::BTC, Asset::USD, dec!(1)));
        oracle.set_delay(Some(Duration::from_millis(200)));
        let result = client(oracle, 20).quote(Asset::BTC, Asset::USD).await;
        assert_eq!(result.unwrap_err(), OracleError::Timeout);
    }

    #[tokio::test]
    async fn test_non_positive_rate_rejected() {
        let oracle = Arc::new(MockOracle::new().with_rate(Asset::USD, Asset::EUR, dec!(0)));
        let result = client(oracle, 100).quote(Asset::USD, Asset::EUR).await;
        assert!(matches!(result, Err(OracleError::InvalidRate { .. })));
    }
}
