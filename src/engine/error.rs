use thiserror::Error;

use crate::models::{ChallengeStatus, Role};

/// Contract violations detected by the challenge engine.
///
/// Every variant is raised before the account is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Account {account_id} is {status} and accepts no further trades")]
    InactiveAccount {
        account_id: String,
        status: ChallengeStatus,
    },

    #[error("Role {role} may not override challenge status")]
    Permission { role: Role },
}
