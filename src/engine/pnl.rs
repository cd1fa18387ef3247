//! Simulated P&L draws for sell trades.
//!
//! The engine never rolls dice itself: a [`PnlDraw`] is produced by a
//! [`PnlModel`] at the boundary and handed in with the trade, so replaying a
//! trade with the same draw reproduces the same account state.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ChallengeRules;

/// Realized P&L expressed as a fraction of the trade's notional value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct PnlDraw(Decimal);

impl PnlDraw {
    pub const ZERO: PnlDraw = PnlDraw(Decimal::ZERO);

    pub fn fraction(fraction: Decimal) -> Self {
        Self(fraction)
    }

    pub fn as_fraction(&self) -> Decimal {
        self.0
    }

    /// P&L amount for a trade of the given notional.
    pub fn apply_to(&self, notional: Decimal) -> Option<Decimal> {
        notional.checked_mul(self.0)
    }

    /// Whether the draw lies inside the band allowed by `rules`.
    pub fn is_within(&self, rules: &ChallengeRules) -> bool {
        self.0 >= rules.pnl_floor() && self.0 <= rules.pnl_ceiling()
    }

    /// Map a unit sample in `[0, 1)` onto the rules' P&L band.
    fn from_unit(unit: f64, rules: &ChallengeRules) -> Self {
        let unit = Decimal::try_from(unit.clamp(0.0, 1.0)).unwrap_or(Decimal::ZERO);
        let floor = rules.pnl_floor();
        let span = rules.pnl_ceiling() - floor;
        Self((floor + unit * span).round_dp(6))
    }
}

/// Source of P&L draws.
pub trait PnlModel: Send + Sync {
    fn draw(&self, rules: &ChallengeRules) -> PnlDraw;
}

/// Unseeded draws from the thread-local RNG.
#[derive(Debug, Default)]
pub struct RandomPnl;

impl PnlModel for RandomPnl {
    fn draw(&self, rules: &ChallengeRules) -> PnlDraw {
        let unit: f64 = rand::thread_rng().gen();
        PnlDraw::from_unit(unit, rules)
    }
}

/// Reproducible draws from a seeded RNG.
#[derive(Debug)]
pub struct SeededPnl {
    rng: Mutex<StdRng>,
}

impl SeededPnl {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl PnlModel for SeededPnl {
    fn draw(&self, rules: &ChallengeRules) -> PnlDraw {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let unit: f64 = rng.gen();
        PnlDraw::from_unit(unit, rules)
    }
}

/// Always returns the same draw.
#[derive(Debug, Clone, Copy)]
pub struct FixedPnl(pub PnlDraw);

impl PnlModel for FixedPnl {
    fn draw(&self, _rules: &ChallengeRules) -> PnlDraw {
        self.0
    }
}
