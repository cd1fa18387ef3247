//! Advisory signal sources: an HTTP client, a static table, and a fallback chain.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::DeskError;
use crate::models::{Market, Recommendation, Signal};

use super::traits::SignalSource;
use super::types::SignalResponse;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Client for the signal endpoint.
pub struct SignalClient {
    client: Client,
    base_url: String,
}

impl SignalClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SignalSource for SignalClient {
    async fn get_signal(&self, symbol: &str, market: Market) -> crate::error::Result<Signal> {
        let url = format!("{}/signal", self.base_url);
        debug!(url = %url, symbol = %symbol, "Fetching signal");

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("market", market.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DeskError::SignalUnavailable {
                symbol: symbol.to_string(),
                reason: format!("{} - {}", status, body),
            });
        }

        let body: SignalResponse = response.json().await?;

        Ok(Signal {
            symbol: symbol.to_uppercase(),
            market,
            recommendation: body.signal,
            rationale: body.reason,
            generated_at: Utc::now(),
        })
    }
}

/// Canned per-market signals used when no live source answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticSignals;

impl StaticSignals {
    fn lookup(market: Market) -> (Recommendation, &'static str) {
        match market {
            Market::Crypto => (
                Recommendation::Hold,
                "Consolidation phase, monitoring key support levels",
            ),
            Market::UsStock => (
                Recommendation::Buy,
                "Strong fundamentals and bullish momentum detected",
            ),
            Market::Morocco => (
                Recommendation::Buy,
                "Undervalued with strong fundamentals and growth potential",
            ),
        }
    }
}

#[async_trait]
impl SignalSource for StaticSignals {
    async fn get_signal(&self, symbol: &str, market: Market) -> crate::error::Result<Signal> {
        let (recommendation, rationale) = Self::lookup(market);
        Ok(Signal {
            symbol: symbol.to_uppercase(),
            market,
            recommendation,
            rationale: rationale.to_string(),
            generated_at: Utc::now(),
        })
    }
}

/// Tries `primary` first and answers from `fallback` when it fails.
pub struct FallbackSignals {
    primary: Option<Arc<dyn SignalSource>>,
    fallback: Arc<dyn SignalSource>,
}

impl FallbackSignals {
    pub fn new(primary: Option<Arc<dyn SignalSource>>, fallback: Arc<dyn SignalSource>) -> Self {
        Self { primary, fallback }
    }

    /// Static signals only.
    pub fn offline() -> Self {
        Self::new(None, Arc::new(StaticSignals))
    }
}

#[async_trait]
impl SignalSource for FallbackSignals {
    async fn get_signal(&self, symbol: &str, market: Market) -> crate::error::Result<Signal> {
        if let Some(primary) = &self.primary {
            match primary.get_signal(symbol, market).await {
                Ok(signal) => return Ok(signal),
                Err(e) => warn!(symbol = %symbol, error = %e, "Signal source failed, using fallback"),
            }
        }
        self.fallback.get_signal(symbol, market).await
    }
}
