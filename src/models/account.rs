//! Challenge account: one purchased simulated-trading attempt.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Challenge tier. Fixed at purchase; decides the starting balance and fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Starter,
    Pro,
    Elite,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Starter, Tier::Pro, Tier::Elite];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Starter => "starter",
            Tier::Pro => "pro",
            Tier::Elite => "elite",
        }
    }

    /// Virtual balance granted on purchase.
    pub fn initial_balance(&self) -> Decimal {
        match self {
            Tier::Starter => dec!(5000),
            Tier::Pro => dec!(15000),
            Tier::Elite => dec!(50000),
        }
    }

    /// Price of the challenge (MAD).
    pub fn fee(&self) -> Decimal {
        match self {
            Tier::Starter => dec!(200),
            Tier::Pro => dec!(500),
            Tier::Elite => dec!(1000),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starter" => Ok(Tier::Starter),
            "pro" => Ok(Tier::Pro),
            "elite" => Ok(Tier::Elite),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Where a challenge stands. `Failed` and `Passed` are terminal for trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    #[default]
    Active,
    Failed,
    Passed,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Failed => "failed",
            ChallengeStatus::Passed => "passed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChallengeStatus::Active)
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ChallengeStatus::Active),
            "failed" => Ok(ChallengeStatus::Failed),
            "passed" | "funded" => Ok(ChallengeStatus::Passed),
            other => Err(format!("unknown challenge status: {other}")),
        }
    }
}

/// Why a challenge failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    DailyLossExceeded,
    TotalLossExceeded,
    AdministrativeOverride,
}

impl FailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailReason::DailyLossExceeded => "daily_loss_exceeded",
            FailReason::TotalLossExceeded => "total_loss_exceeded",
            FailReason::AdministrativeOverride => "administrative_override",
        }
    }

    /// Human-readable description for status displays.
    pub fn description(&self) -> &'static str {
        match self {
            FailReason::DailyLossExceeded => "Max daily loss exceeded",
            FailReason::TotalLossExceeded => "Max total loss exceeded",
            FailReason::AdministrativeOverride => "Manually failed by admin",
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl FromStr for FailReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily_loss_exceeded" | "daily" => Ok(FailReason::DailyLossExceeded),
            "total_loss_exceeded" | "total" => Ok(FailReason::TotalLossExceeded),
            "administrative_override" | "admin" | "manual" => Ok(FailReason::AdministrativeOverride),
            other => Err(format!("unknown fail reason: {other}")),
        }
    }
}

/// How the challenge fee was paid. Recorded only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cmi,
    Crypto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cmi => "cmi",
            PaymentMethod::Crypto => "crypto",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cmi" | "card" => Ok(PaymentMethod::Cmi),
            "crypto" => Ok(PaymentMethod::Crypto),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// A challenge account record.
///
/// `id`, `owner_id`, `tier` and `initial_balance` never change after
/// [`Account::open`]. Balances are only moved by the challenge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier
    pub id: String,

    /// Identity of the trader who owns the challenge
    pub owner_id: String,

    /// Purchased tier
    pub tier: Tier,

    /// Baseline for total drawdown and the profit target
    pub initial_balance: Decimal,

    /// Balance snapshot at the start of the current trading day
    pub daily_start_balance: Decimal,

    /// Live balance
    pub current_balance: Decimal,

    /// High-water mark of `current_balance`
    pub highest_balance: Decimal,

    /// Gain over `initial_balance` in percent, refreshed on every trade
    pub profit_percent: Decimal,

    pub status: ChallengeStatus,

    /// Set only while `status` is `Failed`
    pub fail_reason: Option<FailReason>,

    /// Fee paid for the challenge
    pub amount_paid: Decimal,

    pub payment_method: PaymentMethod,

    /// Optimistic-concurrency counter, bumped by the store on every save
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Open a fresh active challenge for `owner_id`.
    pub fn open(owner_id: impl Into<String>, tier: Tier, payment_method: PaymentMethod) -> Self {
        let balance = tier.initial_balance();
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            tier,
            initial_balance: balance,
            daily_start_balance: balance,
            current_balance: balance,
            highest_balance: balance,
            profit_percent: Decimal::ZERO,
            status: ChallengeStatus::Active,
            fail_reason: None,
            amount_paid: tier.fee(),
            payment_method,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ChallengeStatus::Active
    }

    /// Absolute gain (or loss) against the initial balance.
    pub fn profit_loss(&self) -> Decimal {
        self.current_balance - self.initial_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_uses_tier_catalog() {
        let account = Account::open("trader@example.com", Tier::Pro, PaymentMethod::Crypto);

        assert_eq!(account.initial_balance, dec!(15000));
        assert_eq!(account.current_balance, dec!(15000));
        assert_eq!(account.highest_balance, dec!(15000));
        assert_eq!(account.daily_start_balance, dec!(15000));
        assert_eq!(account.amount_paid, dec!(500));
        assert_eq!(account.status, ChallengeStatus::Active);
        assert!(account.fail_reason.is_none());
        assert_eq!(account.profit_loss(), Decimal::ZERO);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [ChallengeStatus::Active, ChallengeStatus::Failed, ChallengeStatus::Passed] {
            assert_eq!(status.as_str().parse::<ChallengeStatus>().unwrap(), status);
        }
        assert!(ChallengeStatus::Passed.is_terminal());
        assert!(!ChallengeStatus::Active.is_terminal());
    }

    #[test]
    fn test_fail_reason_display() {
        assert_eq!(FailReason::DailyLossExceeded.to_string(), "Max daily loss exceeded");
        assert_eq!(
            "admin".parse::<FailReason>().unwrap(),
            FailReason::AdministrativeOverride
        );
    }
}
