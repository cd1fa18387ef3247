//! Response types for the market-data and signal endpoints.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::Recommendation;

/// Response from `/market-data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataResponse {
    #[serde(default)]
    pub price_data: Vec<CandleResponse>,
    pub current_price: Option<Decimal>,
    #[serde(default)]
    pub change_percent: Decimal,
    /// Unix seconds at which the price was observed
    pub timestamp: Option<i64>,
    /// Set by the backend when it could not produce a price
    pub error: Option<String>,
}

/// One bar in `priceData`. `time` is a label or unix seconds depending on the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleResponse {
    #[serde(default)]
    pub time: serde_json::Value,
    pub close: Decimal,
}

impl CandleResponse {
    pub fn time_label(&self) -> String {
        match &self.time {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Response from `/signal`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalResponse {
    pub signal: Recommendation,
    #[serde(default)]
    pub reason: String,
}
