//! Challenge evaluation engine: a pure state machine over account balances.

mod error;
mod evaluator;
mod pnl;
mod rules;

pub use error::EngineError;
pub use evaluator::{ChallengeEngine, Evaluation, Settlement, Verdict};
pub use pnl::{FixedPnl, PnlDraw, PnlModel, RandomPnl, SeededPnl};
pub use rules::ChallengeRules;
