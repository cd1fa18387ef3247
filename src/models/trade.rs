//! Trade models: what a trader submits, what the engine evaluates, what gets recorded.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Market;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" | "b" => Ok(TradeSide::Buy),
            "sell" | "s" => Ok(TradeSide::Sell),
            other => Err(format!("unknown trade side: {other}")),
        }
    }
}

/// Market order as submitted by a trader. Priced by the desk from a live quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub market: Market,
    pub side: TradeSide,
    pub quantity: Decimal,
}

/// A priced order ready for evaluation.
///
/// The `id` is assigned by the caller so a replayed ticket produces the same
/// trade record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTicket {
    pub id: String,
    pub symbol: String,
    pub market: Market,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub execution_price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl TradeTicket {
    /// Price a request at `execution_price` with a fresh trade id.
    pub fn price(request: &TradeRequest, execution_price: Decimal) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: request.symbol.to_uppercase(),
            market: request.market,
            side: request.side,
            quantity: request.quantity,
            execution_price,
            timestamp: Utc::now(),
        }
    }

    /// Quantity times execution price, `None` if it does not fit a `Decimal`.
    pub fn notional(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.execution_price)
    }
}

/// Immutable record of one executed order. Appended, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade identifier
    pub id: String,

    /// Challenge the trade was booked against
    pub account_id: String,

    /// Trader who placed it
    pub owner_id: String,

    pub symbol: String,

    pub market: Market,

    pub side: TradeSide,

    /// Units traded, always positive
    pub quantity: Decimal,

    /// Price per unit, always positive
    pub execution_price: Decimal,

    /// quantity * execution_price
    pub notional: Decimal,

    /// Simulated P&L realized on a sell; zero for buys
    pub realized_pnl: Decimal,

    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Net effect of this trade on the account balance.
    pub fn balance_delta(&self) -> Decimal {
        match self.side {
            TradeSide::Buy => -self.notional,
            TradeSide::Sell => self.notional + self.realized_pnl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade(side: TradeSide, pnl: Decimal) -> Trade {
        Trade {
            id: "t-1".to_string(),
            account_id: "acc-1".to_string(),
            owner_id: "trader@example.com".to_string(),
            symbol: "BTCUSD".to_string(),
            market: Market::Crypto,
            side,
            quantity: dec!(2),
            execution_price: dec!(100),
            notional: dec!(200),
            realized_pnl: pnl,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_balance_delta_buy_commits_capital() {
        assert_eq!(trade(TradeSide::Buy, Decimal::ZERO).balance_delta(), dec!(-200));
    }

    #[test]
    fn test_balance_delta_sell_includes_pnl() {
        assert_eq!(trade(TradeSide::Sell, dec!(-6)).balance_delta(), dec!(194));
    }

    #[test]
    fn test_ticket_notional_and_symbol_normalization() {
        let request = TradeRequest {
            symbol: "ethusd".to_string(),
            market: Market::Crypto,
            side: TradeSide::Buy,
            quantity: dec!(1.5),
        };
        let ticket = TradeTicket::price(&request, dec!(2000));
        assert_eq!(ticket.symbol, "ETHUSD");
        assert_eq!(ticket.notional(), Some(dec!(3000)));
    }
}
