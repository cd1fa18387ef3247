//! HTTP quote source backed by the market-data endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::DeskError;
use crate::models::{Market, PricePoint, Quote};

use super::traits::QuoteSource;
use super::types::MarketDataResponse;

/// Client for the market-data API (read-only).
pub struct QuoteClient {
    client: Client,
    base_url: String,
    retry_window: Duration,
}

impl QuoteClient {
    pub fn with_timeouts(
        base_url: impl Into<String>,
        request_timeout: Duration,
        retry_window: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_window,
        })
    }

    /// One request. Transport errors and 5xx are transient, everything else permanent.
    async fn fetch_once(
        &self,
        symbol: &str,
        market: Market,
    ) -> std::result::Result<MarketDataResponse, backoff::Error<String>> {
        let url = format!("{}/market-data", self.base_url);
        debug!(url = %url, symbol = %symbol, market = %market, "Fetching market data");

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("market", market.as_str())])
            .send()
            .await
            .map_err(|e| backoff::Error::transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, symbol = %symbol, "Market data request failed, retrying");
            return Err(backoff::Error::transient(format!("{} - {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(backoff::Error::permanent(format!("{} - {}", status, body)));
        }

        response
            .json::<MarketDataResponse>()
            .await
            .map_err(|e| backoff::Error::permanent(format!("Failed to parse market data: {e}")))
    }
}

/// Turn an endpoint response into a validated quote.
fn into_quote(
    symbol: &str,
    market: Market,
    response: MarketDataResponse,
) -> std::result::Result<Quote, DeskError> {
    let unavailable = |reason: String| DeskError::QuoteUnavailable {
        symbol: symbol.to_string(),
        market,
        reason,
    };

    if let Some(error) = response.error {
        return Err(unavailable(error));
    }

    let price = response
        .current_price
        .ok_or_else(|| unavailable("response carried no price".to_string()))?;
    if price <= Decimal::ZERO {
        return Err(unavailable(format!("non-positive price {price}")));
    }

    let as_of = response
        .timestamp
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now);

    let history = response
        .price_data
        .iter()
        .map(|c| PricePoint {
            time: c.time_label(),
            close: c.close,
        })
        .collect();

    Ok(Quote {
        symbol: symbol.to_uppercase(),
        market,
        price,
        history,
        change_percent: response.change_percent,
        as_of,
    })
}

#[async_trait]
impl QuoteSource for QuoteClient {
    async fn get_quote(&self, symbol: &str, market: Market) -> crate::error::Result<Quote> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_window),
            ..ExponentialBackoff::default()
        };

        let response = retry(policy, || self.fetch_once(symbol, market))
            .await
            .map_err(|reason| DeskError::QuoteUnavailable {
                symbol: symbol.to_string(),
                market,
                reason,
            })?;

        into_quote(symbol, market, response)
    }
}
