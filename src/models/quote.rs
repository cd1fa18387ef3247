//! Quotes and advisory signals handed in by external collaborators.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Market;

/// One close in a quote's recent history. Display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: String,
    pub close: Decimal,
}

/// Current price for an instrument. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub market: Market,

    /// Last price, always positive
    pub price: Decimal,

    /// Recent closes, oldest first
    #[serde(default)]
    pub history: Vec<PricePoint>,

    /// Change over the history window in percent
    #[serde(default)]
    pub change_percent: Decimal,

    /// When the source produced this price
    pub as_of: DateTime<Utc>,
}

impl Quote {
    /// Age of the quote relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.as_of
    }
}

/// Advisory recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recommendation::Buy => "BUY",
            Recommendation::Sell => "SELL",
            Recommendation::Hold => "HOLD",
        })
    }
}

/// Non-authoritative trading signal. Never feeds the challenge verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub market: Market,
    pub recommendation: Recommendation,
    pub rationale: String,
    pub generated_at: DateTime<Utc>,
}
