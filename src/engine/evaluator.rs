//! The challenge state machine.
//!
//! `active --trade (daily/total loss breach)--> failed`
//! `active --trade (profit target)--> passed`
//! `active --trade (nothing tripped)--> active`
//! `any --administrative override--> any` (admins only)

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

use crate::models::{Account, ChallengeStatus, FailReason, Role, Trade, TradeSide, TradeTicket};

use super::{ChallengeRules, EngineError, PnlDraw};

/// Result of evaluating an account after a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Continue,
    Failed(FailReason),
    Passed,
}

impl Verdict {
    pub fn status(&self) -> ChallengeStatus {
        match self {
            Verdict::Continue => ChallengeStatus::Active,
            Verdict::Failed(_) => ChallengeStatus::Failed,
            Verdict::Passed => ChallengeStatus::Passed,
        }
    }

    pub fn fail_reason(&self) -> Option<FailReason> {
        match self {
            Verdict::Failed(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Threshold metrics computed for the post-trade balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// `None` when the daily baseline is not positive
    pub daily_loss_percent: Option<Decimal>,
    pub total_loss_percent: Decimal,
    pub profit_percent: Decimal,
    pub verdict: Verdict,
}

/// Everything a caller has to persist after an accepted trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub account: Account,
    pub trade: Trade,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    DailyLoss,
    TotalLoss,
    ProfitTarget,
}

/// Evaluation order. A single trade can trip several rules; the first wins.
const RULE_PRIORITY: [Rule; 3] = [Rule::DailyLoss, Rule::TotalLoss, Rule::ProfitTarget];

fn out_of_range(what: &str) -> EngineError {
    EngineError::InvalidTrade(format!("{what} is out of range"))
}

/// Percentage drop of `balance` below `baseline`. Negative when above.
///
/// `Ok(None)` when the baseline is not positive.
fn percent_below(baseline: Decimal, balance: Decimal) -> Result<Option<Decimal>, EngineError> {
    if baseline <= Decimal::ZERO {
        return Ok(None);
    }
    baseline
        .checked_sub(balance)
        .and_then(|drop| drop.checked_div(baseline))
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .map(Some)
        .ok_or_else(|| out_of_range("loss percentage"))
}

/// Pure rules engine: no I/O, no clock, no randomness.
#[derive(Debug, Clone, Default)]
pub struct ChallengeEngine {
    rules: ChallengeRules,
}

impl ChallengeEngine {
    pub fn new(rules: ChallengeRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ChallengeRules {
        &self.rules
    }

    /// Apply one priced trade to one active account.
    ///
    /// `draw` is only consulted for sells. Returns the updated account and
    /// the trade record; `account` itself is never modified, so any error
    /// leaves the caller's state exactly as it was.
    pub fn apply_trade(
        &self,
        account: &Account,
        ticket: &TradeTicket,
        draw: PnlDraw,
    ) -> Result<Settlement, EngineError> {
        if !account.is_active() {
            return Err(EngineError::InactiveAccount {
                account_id: account.id.clone(),
                status: account.status,
            });
        }
        self.validate_ticket(ticket, draw)?;

        let notional = ticket.notional().ok_or_else(|| out_of_range("notional"))?;
        let realized_pnl = match ticket.side {
            TradeSide::Buy => Decimal::ZERO,
            TradeSide::Sell => draw
                .apply_to(notional)
                .ok_or_else(|| out_of_range("realized P&L"))?,
        };
        let new_balance = match ticket.side {
            TradeSide::Buy => account.current_balance.checked_sub(notional),
            TradeSide::Sell => account
                .current_balance
                .checked_add(notional)
                .and_then(|b| b.checked_add(realized_pnl)),
        }
        .ok_or_else(|| out_of_range("balance"))?;

        let evaluation = self.evaluate(account, new_balance)?;

        let mut updated = account.clone();
        updated.current_balance = new_balance;
        updated.highest_balance = account.highest_balance.max(new_balance);
        updated.profit_percent = evaluation.profit_percent;
        updated.status = evaluation.verdict.status();
        updated.fail_reason = evaluation.verdict.fail_reason();

        let trade = Trade {
            id: ticket.id.clone(),
            account_id: account.id.clone(),
            owner_id: account.owner_id.clone(),
            symbol: ticket.symbol.clone(),
            market: ticket.market,
            side: ticket.side,
            quantity: ticket.quantity,
            execution_price: ticket.execution_price,
            notional,
            realized_pnl,
            timestamp: ticket.timestamp,
        };

        debug!(
            account = %account.id,
            side = %ticket.side,
            notional = %notional,
            balance = %new_balance,
            verdict = ?evaluation.verdict,
            "Trade evaluated"
        );

        Ok(Settlement {
            account: updated,
            trade,
            evaluation,
        })
    }

    /// Start a new trading day: the daily loss baseline becomes the current balance.
    pub fn reset_daily_baseline(&self, account: &Account) -> Account {
        let mut updated = account.clone();
        updated.daily_start_balance = account.current_balance;
        updated
    }

    /// Force a status, bypassing every threshold. Admins only.
    ///
    /// A forced failure without a reason is recorded as
    /// [`FailReason::AdministrativeOverride`]; any other status clears the
    /// fail reason.
    pub fn apply_administrative_override(
        &self,
        account: &Account,
        new_status: ChallengeStatus,
        reason: Option<FailReason>,
        role: Role,
    ) -> Result<Account, EngineError> {
        if role != Role::Admin {
            return Err(EngineError::Permission { role });
        }

        let mut updated = account.clone();
        updated.status = new_status;
        updated.fail_reason = match new_status {
            ChallengeStatus::Failed => Some(reason.unwrap_or(FailReason::AdministrativeOverride)),
            ChallengeStatus::Active | ChallengeStatus::Passed => None,
        };
        Ok(updated)
    }

    /// Compute threshold metrics and the verdict for a prospective balance.
    ///
    /// Fails with `InvalidTrade` when a percentage cannot be represented.
    pub fn evaluate(&self, account: &Account, new_balance: Decimal) -> Result<Evaluation, EngineError> {
        let daily_loss_percent = percent_below(account.daily_start_balance, new_balance)?;
        let total_loss_percent = percent_below(account.initial_balance, new_balance)?;
        let profit_percent = total_loss_percent.map(|loss| -loss);

        let verdict = RULE_PRIORITY
            .iter()
            .find_map(|rule| match rule {
                Rule::DailyLoss => daily_loss_percent
                    .filter(|loss| *loss >= self.rules.max_daily_loss_pct)
                    .map(|_| Verdict::Failed(FailReason::DailyLossExceeded)),
                Rule::TotalLoss => total_loss_percent
                    .filter(|loss| *loss >= self.rules.max_total_loss_pct)
                    .map(|_| Verdict::Failed(FailReason::TotalLossExceeded)),
                Rule::ProfitTarget => profit_percent
                    .filter(|profit| *profit >= self.rules.profit_target_pct)
                    .map(|_| Verdict::Passed),
            })
            .unwrap_or(Verdict::Continue);

        Ok(Evaluation {
            daily_loss_percent,
            total_loss_percent: total_loss_percent.unwrap_or(Decimal::ZERO),
            profit_percent: profit_percent.unwrap_or(Decimal::ZERO),
            verdict,
        })
    }

    fn validate_ticket(&self, ticket: &TradeTicket, draw: PnlDraw) -> Result<(), EngineError> {
        if ticket.quantity <= Decimal::ZERO {
            return Err(EngineError::InvalidTrade(format!(
                "quantity must be positive, got {}",
                ticket.quantity
            )));
        }
        if ticket.execution_price <= Decimal::ZERO {
            return Err(EngineError::InvalidTrade(format!(
                "execution price must be positive, got {}",
                ticket.execution_price
            )));
        }
        if ticket.side == TradeSide::Sell && !draw.is_within(&self.rules) {
            return Err(EngineError::InvalidTrade(format!(
                "P&L draw {} is outside [{}, {}]",
                draw.as_fraction(),
                self.rules.pnl_floor(),
                self.rules.pnl_ceiling()
            )));
        }
        Ok(())
    }
}
