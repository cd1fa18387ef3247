//! Progress of one challenge toward its targets and limits.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::engine::ChallengeRules;
use crate::models::Account;

/// Daily loss (percent) at which the account is flagged critical.
const CRITICAL_DAILY_LOSS_PCT: Decimal = dec!(4);

/// Daily loss (percent) at which the account is flagged high risk.
const HIGH_DAILY_LOSS_PCT: Decimal = dec!(2);

/// Warn once daily loss passes this many percent.
const DAILY_LOSS_WARNING_PCT: Decimal = dec!(3);

/// Warn once total loss passes this many percent.
const TOTAL_LOSS_WARNING_PCT: Decimal = dec!(7);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "LOW",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        })
    }
}

/// Dashboard view of an account against the challenge rules.
#[derive(Debug, Clone, Serialize)]
pub struct AccountProgress {
    pub profit_loss: Decimal,
    pub profit_percent: Decimal,

    /// Loss against today's baseline, zero when above it
    pub daily_loss_percent: Decimal,

    /// Loss against the initial balance, zero when above it
    pub total_loss_percent: Decimal,

    /// Share of the profit target reached (0-100)
    pub profit_progress: Decimal,

    /// Share of the daily loss limit used (0-100)
    pub daily_loss_progress: Decimal,

    /// Share of the total loss limit used (0-100)
    pub total_loss_progress: Decimal,

    pub risk_level: RiskLevel,
    pub warnings: Vec<String>,
}

fn loss_percent(baseline: Decimal, balance: Decimal) -> Decimal {
    if baseline <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((baseline - balance) / baseline * dec!(100)).max(Decimal::ZERO)
}

fn progress(value: Decimal, limit: Decimal) -> Decimal {
    if limit <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (value / limit * dec!(100)).clamp(Decimal::ZERO, dec!(100))
}

impl AccountProgress {
    pub fn from_account(account: &Account, rules: &ChallengeRules) -> Self {
        let profit_percent = if account.initial_balance > Decimal::ZERO {
            account.profit_loss() / account.initial_balance * dec!(100)
        } else {
            Decimal::ZERO
        };
        let daily_loss_percent = loss_percent(account.daily_start_balance, account.current_balance);
        let total_loss_percent = loss_percent(account.initial_balance, account.current_balance);

        let risk_level = if daily_loss_percent >= CRITICAL_DAILY_LOSS_PCT {
            RiskLevel::Critical
        } else if daily_loss_percent >= HIGH_DAILY_LOSS_PCT {
            RiskLevel::High
        } else {
            RiskLevel::Low
        };

        let mut warnings = Vec::new();
        if daily_loss_percent > DAILY_LOSS_WARNING_PCT {
            warnings.push(format!(
                "Daily loss at {:.2}% of a {}% limit",
                daily_loss_percent.to_f64().unwrap_or(0.0),
                rules.max_daily_loss_pct
            ));
        }
        if total_loss_percent > TOTAL_LOSS_WARNING_PCT {
            warnings.push(format!(
                "Total loss at {:.2}% of a {}% limit",
                total_loss_percent.to_f64().unwrap_or(0.0),
                rules.max_total_loss_pct
            ));
        }

        Self {
            profit_loss: account.profit_loss(),
            profit_percent,
            daily_loss_percent,
            total_loss_percent,
            profit_progress: progress(profit_percent, rules.profit_target_pct),
            daily_loss_progress: progress(daily_loss_percent, rules.max_daily_loss_pct),
            total_loss_progress: progress(total_loss_percent, rules.max_total_loss_pct),
            risk_level,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, Tier};

    fn account_at(daily_start: Decimal, current: Decimal) -> Account {
        let mut account = Account::open("t@example.com", Tier::Starter, PaymentMethod::Cmi);
        account.daily_start_balance = daily_start;
        account.current_balance = current;
        account
    }

    #[test]
    fn test_fresh_account_is_low_risk() {
        let progress = AccountProgress::from_account(&account_at(dec!(5000), dec!(5000)), &ChallengeRules::default());
        assert_eq!(progress.risk_level, RiskLevel::Low);
        assert_eq!(progress.profit_progress, Decimal::ZERO);
        assert_eq!(progress.daily_loss_progress, Decimal::ZERO);
        assert!(progress.warnings.is_empty());
    }

    #[test]
    fn test_profit_progress_is_clamped() {
        // 15% profit against a 10% target
        let progress = AccountProgress::from_account(&account_at(dec!(5000), dec!(5750)), &ChallengeRules::default());
        assert_eq!(progress.profit_percent, dec!(15));
        assert_eq!(progress.profit_progress, dec!(100));
        assert_eq!(progress.total_loss_percent, Decimal::ZERO);
    }

    #[test]
    fn test_risk_levels_follow_daily_loss() {
        let rules = ChallengeRules::default();

        let high = AccountProgress::from_account(&account_at(dec!(5000), dec!(4900)), &rules);
        assert_eq!(high.daily_loss_percent, dec!(2));
        assert_eq!(high.risk_level, RiskLevel::High);
        assert!(high.warnings.is_empty());

        let critical = AccountProgress::from_account(&account_at(dec!(5000), dec!(4790)), &rules);
        assert_eq!(critical.risk_level, RiskLevel::Critical);
        assert_eq!(critical.daily_loss_progress, dec!(84));
        assert_eq!(critical.warnings.len(), 1);
    }

    #[test]
    fn test_total_loss_warning() {
        // Day started at 4700 after earlier losses; total loss now 7.2%
        let progress = AccountProgress::from_account(&account_at(dec!(4700), dec!(4640)), &ChallengeRules::default());
        assert_eq!(progress.total_loss_percent, dec!(7.2));
        assert_eq!(progress.total_loss_progress, dec!(72));
        assert_eq!(progress.warnings.len(), 1);
        assert!(progress.warnings[0].starts_with("Total loss"));
    }
}
