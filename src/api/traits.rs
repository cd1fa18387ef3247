//! Contracts of the external collaborators the desk talks to.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Actor, Market, Quote, Signal};

/// Supplies current prices. May fail or hand back stale data.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn get_quote(&self, symbol: &str, market: Market) -> Result<Quote>;
}

/// Advisory recommendations for display. Never authoritative.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn get_signal(&self, symbol: &str, market: Market) -> Result<Signal>;
}

/// Resolves who is calling. Queried once at the edge, then passed along.
pub trait IdentityProvider: Send + Sync {
    fn current_actor(&self) -> Result<Actor>;
}
