//! Data models for challenge accounts, trades, quotes, and actors.

mod account;
mod actor;
mod market;
mod quote;
mod trade;

pub use account::{Account, ChallengeStatus, FailReason, PaymentMethod, Tier};
pub use actor::{Actor, Role};
pub use market::{Instrument, Market};
pub use quote::{PricePoint, Quote, Recommendation, Signal};
pub use trade::{Trade, TradeRequest, TradeSide, TradeTicket};
