//! External collaborators: quote, signal, and identity sources.

mod identity;
mod quote_client;
mod signal_client;
mod traits;
mod types;

pub use identity::StaticIdentity;
pub use quote_client::QuoteClient;
pub use signal_client::{FallbackSignals, SignalClient, StaticSignals};
pub use traits::{IdentityProvider, QuoteSource, SignalSource};
