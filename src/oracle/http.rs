//! HTTP rate oracle
//!
//! `GET {base_url}/rates?from=BTC&to=USD` answering
//! `{"from":"BTC","to":"USD","rate":"43500","observed_at":"..."}`.
//! 404 means the pair is unknown.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::{OracleError, RateOracle, RateQuote};
use crate::core_types::Asset;

#[derive(Debug, Deserialize)]
struct RateResponse {
    from: String,
    to: String,
    rate: Decimal,
    #[serde(default)]
    observed_at: Option<DateTime<Utc>>,
}

pub struct HttpRateOracle {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRateOracle {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Rate oracle client for {}", base_url);
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn map_transport(e: reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout
        } else {
            OracleError::Unavailable(format!("HTTP request failed: {}", e))
        }
    }
}

#[async_trait]
impl RateOracle for HttpRateOracle {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn quote(&self, from: Asset, to: Asset) -> Result<RateQuote, OracleError> {
        let response = self
            .client
            .get(format!("{}/rates", self.base_url))
            .query(&[("from", from.code()), ("to", to.code())])
            .send()
            .await
            .map_err(Self::map_transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(OracleError::NotFound { from, to }),
            status if !status.is_success() => {
                return Err(OracleError::Unavailable(format!(
                    "rate service answered {}",
                    status
                )));
            }
            _ => {}
        }

        let body: RateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Unavailable(format!("Failed to parse response: {}", e))
            }
        })?;

        let parse = |code: &str| {
            code.parse::<Asset>()
                .map_err(|e| OracleError::Unavailable(e.to_string()))
        };
        Ok(RateQuote {
            from: parse(&body.from)?,
            to: parse(&body.to)?,
            rate: body.rate,
            observed_at: body.observed_at.unwrap_or_else(Utc::now),
        })
    }
}
