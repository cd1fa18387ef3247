//! Challenge rule configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Thresholds a challenge is evaluated against. All values are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRules {
    /// Loss against the daily start balance that fails the challenge
    pub max_daily_loss_pct: Decimal,

    /// Loss against the initial balance that fails the challenge
    pub max_total_loss_pct: Decimal,

    /// Gain over the initial balance that passes the challenge
    pub profit_target_pct: Decimal,

    /// Largest simulated P&L on a sell, as percent of notional (either side)
    pub pnl_band_pct: Decimal,

    /// How far the upper edge of the P&L band is pulled in, giving draws a
    /// negative expected value
    pub pnl_loss_skew_pct: Decimal,
}

impl Default for ChallengeRules {
    fn default() -> Self {
        Self {
            max_daily_loss_pct: dec!(5),
            max_total_loss_pct: dec!(10),
            profit_target_pct: dec!(10),
            pnl_band_pct: dec!(10),    // ±10% of notional
            pnl_loss_skew_pct: dec!(2), // draws land in [-10%, +8%]
        }
    }
}

impl ChallengeRules {
    /// Lowest allowed P&L fraction of notional.
    pub fn pnl_floor(&self) -> Decimal {
        -self.pnl_band_pct / dec!(100)
    }

    /// Highest allowed P&L fraction of notional.
    pub fn pnl_ceiling(&self) -> Decimal {
        (self.pnl_band_pct - self.pnl_loss_skew_pct) / dec!(100)
    }

    /// Check the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("max_daily_loss_pct", self.max_daily_loss_pct),
            ("max_total_loss_pct", self.max_total_loss_pct),
            ("profit_target_pct", self.profit_target_pct),
            ("pnl_band_pct", self.pnl_band_pct),
        ] {
            if value <= Decimal::ZERO {
                return Err(format!("{name} must be positive, got {value}"));
            }
        }
        if self.pnl_loss_skew_pct < Decimal::ZERO || self.pnl_loss_skew_pct > self.pnl_band_pct {
            return Err(format!(
                "pnl_loss_skew_pct must be within [0, {}], got {}",
                self.pnl_band_pct, self.pnl_loss_skew_pct
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pnl_band() {
        let rules = ChallengeRules::default();
        assert_eq!(rules.pnl_floor(), dec!(-0.1));
        assert_eq!(rules.pnl_ceiling(), dec!(0.08));
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_skew() {
        let rules = ChallengeRules {
            pnl_loss_skew_pct: dec!(25),
            ..ChallengeRules::default()
        };
        assert!(rules.validate().is_err());

        let rules = ChallengeRules {
            profit_target_pct: Decimal::ZERO,
            ..ChallengeRules::default()
        };
        assert!(rules.validate().is_err());
    }
}
