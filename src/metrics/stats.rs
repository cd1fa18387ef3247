//! Platform-wide statistics and the funded-trader leaderboard.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::models::{Account, ChallengeStatus, Tier};

/// Aggregate figures over every challenge sold.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlatformStats {
    pub total_accounts: usize,
    pub active_accounts: usize,
    pub failed_accounts: usize,
    pub passed_accounts: usize,

    /// Sum of fees paid
    pub revenue: Decimal,

    /// Passed / (passed + failed), 0.0 to 1.0
    pub pass_rate: f64,

    pub mean_profit_percent: f64,
    pub profit_percent_std_dev: f64,
}

impl PlatformStats {
    pub fn from_accounts(accounts: &[Account]) -> Self {
        let mut stats = Self {
            total_accounts: accounts.len(),
            ..Self::default()
        };

        for account in accounts {
            match account.status {
                ChallengeStatus::Active => stats.active_accounts += 1,
                ChallengeStatus::Failed => stats.failed_accounts += 1,
                ChallengeStatus::Passed => stats.passed_accounts += 1,
            }
            stats.revenue += account.amount_paid;
        }

        let finished = stats.passed_accounts + stats.failed_accounts;
        if finished > 0 {
            stats.pass_rate = stats.passed_accounts as f64 / finished as f64;
        }

        let profits: Vec<f64> = accounts
            .iter()
            .filter_map(|a| a.profit_percent.to_f64())
            .collect();
        if !profits.is_empty() {
            stats.mean_profit_percent = profits.clone().mean();
        }
        if profits.len() > 1 {
            stats.profit_percent_std_dev = profits.std_dev();
        }

        stats
    }
}

/// One funded trader on the leaderboard.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based
    pub rank: usize,
    pub account_id: String,
    pub owner_id: String,
    pub tier: Tier,
    pub profit_percent: Decimal,
    pub current_balance: Decimal,
}

/// Rank passed accounts by profit, best first. Earlier passes win ties.
pub fn rank_leaderboard(accounts: &[Account], limit: usize) -> Vec<LeaderboardEntry> {
    let mut funded: Vec<&Account> = accounts
        .iter()
        .filter(|a| a.status == ChallengeStatus::Passed)
        .collect();

    funded.sort_by(|a, b| {
        b.profit_percent
            .cmp(&a.profit_percent)
            .then_with(|| a.updated_at.cmp(&b.updated_at))
    });

    funded
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, account)| LeaderboardEntry {
            rank: i + 1,
            account_id: account.id.clone(),
            owner_id: account.owner_id.clone(),
            tier: account.tier,
            profit_percent: account.profit_percent,
            current_balance: account.current_balance,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailReason, PaymentMethod};
    use rust_decimal_macros::dec;

    fn account(tier: Tier, status: ChallengeStatus, profit: Decimal) -> Account {
        let mut account = Account::open("t@example.com", tier, PaymentMethod::Cmi);
        account.status = status;
        account.profit_percent = profit;
        if status == ChallengeStatus::Failed {
            account.fail_reason = Some(FailReason::TotalLossExceeded);
        }
        account
    }

    #[test]
    fn test_empty_platform() {
        let stats = PlatformStats::from_accounts(&[]);
        assert_eq!(stats.total_accounts, 0);
        assert_eq!(stats.revenue, Decimal::ZERO);
        assert_eq!(stats.mean_profit_percent, 0.0);
        assert_eq!(stats.pass_rate, 0.0);
    }

    #[test]
    fn test_counts_and_revenue() {
        let accounts = vec![
            account(Tier::Starter, ChallengeStatus::Active, dec!(2)),
            account(Tier::Pro, ChallengeStatus::Failed, dec!(-10)),
            account(Tier::Elite, ChallengeStatus::Passed, dec!(14)),
            account(Tier::Starter, ChallengeStatus::Passed, dec!(10)),
        ];
        let stats = PlatformStats::from_accounts(&accounts);

        assert_eq!(stats.total_accounts, 4);
        assert_eq!(stats.active_accounts, 1);
        assert_eq!(stats.failed_accounts, 1);
        assert_eq!(stats.passed_accounts, 2);
        assert_eq!(stats.revenue, dec!(1900));
        assert!((stats.pass_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((stats.mean_profit_percent - 4.0).abs() < 1e-9);
        assert!(stats.profit_percent_std_dev > 0.0);
    }

    #[test]
    fn test_leaderboard_ranks_passed_only() {
        let accounts = vec![
            account(Tier::Starter, ChallengeStatus::Passed, dec!(11)),
            account(Tier::Pro, ChallengeStatus::Active, dec!(40)),
            account(Tier::Elite, ChallengeStatus::Passed, dec!(17.5)),
            account(Tier::Pro, ChallengeStatus::Passed, dec!(10)),
        ];

        let board = rank_leaderboard(&accounts, 2);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].profit_percent, dec!(17.5));
        assert_eq!(board[0].tier, Tier::Elite);
        assert_eq!(board[1].profit_percent, dec!(11));
    }
}
