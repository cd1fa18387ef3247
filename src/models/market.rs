//! Market catalog: the venues a challenge can trade and their listed instruments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Venue an instrument is quoted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    #[default]
    Crypto,
    UsStock,
    Morocco,
}

/// A tradable symbol with its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub symbol: &'static str,
    pub name: &'static str,
}

const CRYPTO: &[Instrument] = &[
    Instrument { symbol: "BTCUSD", name: "Bitcoin" },
    Instrument { symbol: "ETHUSD", name: "Ethereum" },
    Instrument { symbol: "SOLUSD", name: "Solana" },
    Instrument { symbol: "BNBUSD", name: "Binance Coin" },
    Instrument { symbol: "XRPUSD", name: "Ripple" },
    Instrument { symbol: "ADAUSD", name: "Cardano" },
    Instrument { symbol: "DOGEUSD", name: "Dogecoin" },
    Instrument { symbol: "MATICUSD", name: "Polygon" },
];

const US_STOCK: &[Instrument] = &[
    Instrument { symbol: "AAPL", name: "Apple Inc." },
    Instrument { symbol: "TSLA", name: "Tesla Inc." },
    Instrument { symbol: "GOOGL", name: "Alphabet Inc." },
    Instrument { symbol: "MSFT", name: "Microsoft" },
    Instrument { symbol: "NVDA", name: "NVIDIA" },
];

const MOROCCO: &[Instrument] = &[
    Instrument { symbol: "IAM", name: "Maroc Telecom" },
    Instrument { symbol: "ATW", name: "Attijariwafa Bank" },
    Instrument { symbol: "BCP", name: "Banque Centrale Pop." },
    Instrument { symbol: "LBV", name: "Label Vie" },
    Instrument { symbol: "CDM", name: "Crédit du Maroc" },
];

impl Market {
    pub const ALL: [Market; 3] = [Market::Crypto, Market::UsStock, Market::Morocco];

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Crypto => "crypto",
            Market::UsStock => "us_stock",
            Market::Morocco => "morocco",
        }
    }

    /// Prefix used when displaying prices on this market.
    pub fn currency_symbol(&self) -> &'static str {
        match self {
            Market::Morocco => "MAD ",
            Market::Crypto | Market::UsStock => "$",
        }
    }

    /// Instruments listed on this market, in display order.
    pub fn instruments(&self) -> &'static [Instrument] {
        match self {
            Market::Crypto => CRYPTO,
            Market::UsStock => US_STOCK,
            Market::Morocco => MOROCCO,
        }
    }

    /// Look up a listed instrument by symbol (case-insensitive).
    pub fn find_instrument(&self, symbol: &str) -> Option<&'static Instrument> {
        self.instruments()
            .iter()
            .find(|i| i.symbol.eq_ignore_ascii_case(symbol))
    }

    /// The instrument selected by default when switching to this market.
    pub fn default_instrument(&self) -> &'static Instrument {
        &self.instruments()[0]
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crypto" => Ok(Market::Crypto),
            "us_stock" | "us-stock" | "usstock" | "stocks" => Ok(Market::UsStock),
            "morocco" | "casablanca" => Ok(Market::Morocco),
            other => Err(format!("unknown market: {other}")),
        }
    }
}
