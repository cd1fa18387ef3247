use thiserror::Error;

use crate::engine::EngineError;
use crate::models::Market;

pub type Result<T> = std::result::Result<T, DeskError>;

/// Errors surfaced by the desk and its collaborators.
#[derive(Debug, Error)]
pub enum DeskError {
    // Engine contract violations
    #[error(transparent)]
    Engine(#[from] EngineError),

    // Collaborator failures
    #[error("Quote unavailable for {symbol} ({market}): {reason}")]
    QuoteUnavailable {
        symbol: String,
        market: Market,
        reason: String,
    },

    #[error("Signal unavailable for {symbol}: {reason}")]
    SignalUnavailable { symbol: String, reason: String },

    #[error("Concurrent update detected on account {account_id}")]
    Conflict { account_id: String },

    #[error("Trade {0} was already recorded")]
    DuplicateTrade(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Request validation
    #[error("No active challenge for {owner_id}")]
    NoActiveChallenge { owner_id: String },

    #[error("{owner_id} already has an active challenge ({account_id})")]
    ActiveChallengeExists { owner_id: String, account_id: String },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("{symbol} is not listed on {market}")]
    UnknownInstrument { symbol: String, market: Market },

    #[error("Insufficient balance: order needs {required}, account holds {available}")]
    InsufficientBalance {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("Identity unavailable: {0}")]
    Identity(String),
}

impl DeskError {
    /// Whether the caller should reload state and retry the whole operation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DeskError::Conflict { .. })
    }
}
