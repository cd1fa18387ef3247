//! Challenge desk: the boundary between callers and the challenge engine.
//!
//! Handles:
//! - Selling challenges from the tier catalog
//! - Pricing orders from live quotes and drawing simulated P&L
//! - Serializing trades per account and committing them atomically
//! - Day rollover, admin overrides, dashboards and platform figures

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{QuoteSource, SignalSource};
use crate::config::DeskConfig;
use crate::db::AccountStore;
use crate::engine::{ChallengeEngine, EngineError, Evaluation, PnlDraw, PnlModel};
use crate::error::{DeskError, Result};
use crate::metrics::{rank_leaderboard, AccountProgress, LeaderboardEntry, PlatformStats};
use crate::models::{
    Account, Actor, ChallengeStatus, FailReason, Market, PaymentMethod, Quote, Signal, Tier,
    Trade, TradeRequest, TradeSide, TradeTicket,
};

/// Trades shown on the dashboard.
const DASHBOARD_TRADES: i64 = 10;

/// Outcome of an accepted trade.
#[derive(Debug, Clone)]
pub struct TradeReceipt {
    pub trade: Trade,
    pub account: Account,
    pub evaluation: Evaluation,

    /// Evaluations run before the commit landed (1 unless a conflict was retried)
    pub attempts: u32,
}

/// Everything the trader dashboard shows. Collaborator failures leave gaps.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub account: Option<Account>,
    pub progress: Option<AccountProgress>,
    pub recent_trades: Vec<Trade>,
    pub quote: Option<Quote>,
    pub signal: Option<Signal>,
}

/// Orchestrates the engine, the account store and the market collaborators.
pub struct ChallengeDesk {
    config: DeskConfig,
    engine: ChallengeEngine,
    store: Arc<dyn AccountStore>,
    quotes: Arc<dyn QuoteSource>,
    signals: Arc<dyn SignalSource>,
    pnl: Arc<dyn PnlModel>,

    // One lock per account (and per owner for purchases). Entries live only
    // while someone holds or waits on them.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChallengeDesk {
    pub fn new(
        config: DeskConfig,
        store: Arc<dyn AccountStore>,
        quotes: Arc<dyn QuoteSource>,
        signals: Arc<dyn SignalSource>,
        pnl: Arc<dyn PnlModel>,
    ) -> Self {
        let engine = ChallengeEngine::new(config.rules.clone());
        Self {
            config,
            engine,
            store,
            quotes,
            signals,
            pnl,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run `work` holding the lock for `key`, then drop the entry if nobody else wants it.
    async fn locked<T, F, Fut>(&self, key: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let outcome = {
            let _guard = lock.lock().await;
            work().await
        };

        let mut locks = self.locks.lock().await;
        // Only the map and this task still hold it.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
        outcome
    }

    /// Open a new challenge for `actor`. One active challenge per trader.
    pub async fn purchase(
        &self,
        actor: &Actor,
        tier: Tier,
        payment_method: PaymentMethod,
    ) -> Result<Account> {
        let key = format!("owner:{}", actor.id);
        self.locked(&key, move || self.purchase_locked(actor, tier, payment_method))
            .await
    }

    async fn purchase_locked(
        &self,
        actor: &Actor,
        tier: Tier,
        payment_method: PaymentMethod,
    ) -> Result<Account> {
        if let Some(existing) = self.store.load_active_account(&actor.id).await? {
            return Err(DeskError::ActiveChallengeExists {
                owner_id: actor.id.clone(),
                account_id: existing.id,
            });
        }

        let account = Account::open(actor.id.clone(), tier, payment_method);
        self.store.create_account(&account).await?;

        info!(
            owner = %actor.id,
            account = %account.id,
            tier = %tier,
            paid = %account.amount_paid,
            "Challenge purchased"
        );
        Ok(account)
    }

    /// Price, evaluate and book one market order on the actor's active challenge.
    pub async fn place_trade(&self, actor: &Actor, request: &TradeRequest) -> Result<TradeReceipt> {
        if request.market.find_instrument(&request.symbol).is_none() {
            return Err(DeskError::UnknownInstrument {
                symbol: request.symbol.clone(),
                market: request.market,
            });
        }

        let account_id = self
            .store
            .load_active_account(&actor.id)
            .await?
            .map(|a| a.id)
            .ok_or_else(|| DeskError::NoActiveChallenge {
                owner_id: actor.id.clone(),
            })?;

        let id = account_id.as_str();
        self.locked(id, move || self.place_trade_locked(id, request)).await
    }

    async fn place_trade_locked(&self, account_id: &str, request: &TradeRequest) -> Result<TradeReceipt> {
        let quote = self.fresh_quote(&request.symbol, request.market).await?;
        let ticket = TradeTicket::price(request, quote.price);
        let draw = match ticket.side {
            TradeSide::Buy => PnlDraw::ZERO,
            TradeSide::Sell => self.pnl.draw(self.engine.rules()),
        };

        let mut attempts = 0;
        loop {
            attempts += 1;

            let account = self
                .store
                .load_account(account_id)
                .await?
                .ok_or_else(|| DeskError::AccountNotFound(account_id.to_string()))?;

            // An unrepresentable notional is left for the engine to reject.
            if let (TradeSide::Buy, Some(notional)) = (ticket.side, ticket.notional()) {
                if account.is_active() && notional > account.current_balance {
                    return Err(DeskError::InsufficientBalance {
                        required: notional,
                        available: account.current_balance,
                    });
                }
            }

            let settlement = self.engine.apply_trade(&account, &ticket, draw)?;

            match self.store.commit_trade(&settlement.account, &settlement.trade).await {
                Ok(stored) => {
                    info!(
                        account = %stored.id,
                        trade = %settlement.trade.id,
                        symbol = %settlement.trade.symbol,
                        side = %settlement.trade.side,
                        notional = %settlement.trade.notional,
                        balance = %stored.current_balance,
                        status = %stored.status,
                        "Trade booked"
                    );
                    if let Some(reason) = stored.fail_reason {
                        warn!(account = %stored.id, reason = %reason, "Challenge failed");
                    } else if stored.status == ChallengeStatus::Passed {
                        info!(account = %stored.id, profit = %stored.profit_percent, "Challenge passed");
                    }

                    return Ok(TradeReceipt {
                        trade: settlement.trade,
                        account: stored,
                        evaluation: settlement.evaluation,
                        attempts,
                    });
                }
                Err(e) if e.is_conflict() && attempts <= self.config.max_conflict_retries => {
                    warn!(account = %account_id, attempt = attempts, "Account changed underneath trade, re-evaluating");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch a quote and reject it if it is too old to trade on.
    async fn fresh_quote(&self, symbol: &str, market: Market) -> Result<Quote> {
        let quote = self.quotes.get_quote(symbol, market).await?;

        let age = quote.age(Utc::now());
        if age > Duration::seconds(self.config.max_quote_age_secs) {
            return Err(DeskError::QuoteUnavailable {
                symbol: symbol.to_string(),
                market,
                reason: format!("stale quote ({}s old)", age.num_seconds()),
            });
        }

        debug!(symbol = %symbol, price = %quote.price, "Quote accepted");
        Ok(quote)
    }

    /// Load, change and save one account under its lock, retrying on conflict.
    async fn update_account<F>(&self, account_id: &str, change: F) -> Result<Account>
    where
        F: FnMut(&Account) -> Result<Account>,
    {
        self.locked(account_id, move || self.update_account_locked(account_id, change))
            .await
    }

    async fn update_account_locked<F>(&self, account_id: &str, mut change: F) -> Result<Account>
    where
        F: FnMut(&Account) -> Result<Account>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;

            let current = self
                .store
                .load_account(account_id)
                .await?
                .ok_or_else(|| DeskError::AccountNotFound(account_id.to_string()))?;
            let updated = change(&current)?;

            match self.store.save_account(&updated).await {
                Ok(stored) => return Ok(stored),
                Err(e) if e.is_conflict() && attempts <= self.config.max_conflict_retries => {
                    warn!(account = %account_id, attempt = attempts, "Save conflicted, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Start a new trading day for every active challenge. Returns how many were reset.
    pub async fn reset_daily_baselines(&self) -> Result<usize> {
        let page_size = self.config.scan_page_size;
        let engine = &self.engine;
        let mut reset = 0;
        let mut after: Option<String> = None;

        loop {
            let page = self
                .store
                .list_accounts(Some(ChallengeStatus::Active), after.as_deref(), page_size)
                .await?;
            let last_page = (page.len() as i64) < page_size;
            after = page.last().map(|a| a.id.clone());

            for account in page {
                match self
                    .update_account(&account.id, |current| Ok(engine.reset_daily_baseline(current)))
                    .await
                {
                    Ok(stored) => {
                        debug!(account = %stored.id, baseline = %stored.daily_start_balance, "Daily baseline reset");
                        reset += 1;
                    }
                    Err(e) => warn!(account = %account.id, error = %e, "Failed to reset daily baseline"),
                }
            }

            if last_page {
                break;
            }
        }

        info!(count = reset, "Daily baselines reset");
        Ok(reset)
    }

    /// Force an account's status. Admins only.
    pub async fn override_status(
        &self,
        actor: &Actor,
        account_id: &str,
        status: ChallengeStatus,
        reason: Option<FailReason>,
    ) -> Result<Account> {
        if !actor.is_admin() {
            return Err(EngineError::Permission { role: actor.role }.into());
        }

        let engine = &self.engine;
        let stored = self
            .update_account(account_id, |current| {
                engine
                    .apply_administrative_override(current, status, reason, actor.role)
                    .map_err(DeskError::from)
            })
            .await?;

        info!(
            admin = %actor.id,
            account = %account_id,
            status = %stored.status,
            reason = ?stored.fail_reason,
            "Status overridden"
        );
        Ok(stored)
    }

    /// The actor's latest challenge with live market context.
    pub async fn dashboard(&self, actor: &Actor, symbol: Option<&str>, market: Market) -> Result<Dashboard> {
        let symbol = symbol
            .map(str::to_string)
            .unwrap_or_else(|| market.default_instrument().symbol.to_string());

        let (account, quote, signal) = futures::join!(
            self.store.latest_account(&actor.id),
            self.quotes.get_quote(&symbol, market),
            self.signals.get_signal(&symbol, market),
        );

        let account = account?;
        let quote = quote
            .map_err(|e| warn!(symbol = %symbol, error = %e, "Quote unavailable for dashboard"))
            .ok();
        let signal = signal
            .map_err(|e| warn!(symbol = %symbol, error = %e, "Signal unavailable for dashboard"))
            .ok();

        let recent_trades = match &account {
            Some(account) => self.store.list_trades(&account.id, DASHBOARD_TRADES).await?,
            None => Vec::new(),
        };
        let progress = account
            .as_ref()
            .map(|a| AccountProgress::from_account(a, self.engine.rules()));

        Ok(Dashboard {
            account,
            progress,
            recent_trades,
            quote,
            signal,
        })
    }

    /// The actor's most recent challenge, whatever its status.
    pub async fn latest_account(&self, actor: &Actor) -> Result<Option<Account>> {
        self.store.latest_account(&actor.id).await
    }

    /// Trades on the actor's latest challenge, newest first.
    pub async fn history(&self, actor: &Actor, limit: i64) -> Result<Vec<Trade>> {
        match self.latest_account(actor).await? {
            Some(account) => self.store.list_trades(&account.id, limit).await,
            None => Ok(Vec::new()),
        }
    }

    /// Funded traders ranked by profit.
    pub async fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(self.config.leaderboard_size as usize);
        let passed = self.scan_accounts(Some(ChallengeStatus::Passed)).await?;
        Ok(rank_leaderboard(&passed, limit))
    }

    /// Platform-wide counts, revenue and profit distribution. Admins only.
    pub async fn platform_stats(&self, actor: &Actor) -> Result<PlatformStats> {
        if !actor.is_admin() {
            return Err(EngineError::Permission { role: actor.role }.into());
        }
        let accounts = self.scan_accounts(None).await?;
        Ok(PlatformStats::from_accounts(&accounts))
    }

    /// Every account with `status`, read a page at a time.
    async fn scan_accounts(&self, status: Option<ChallengeStatus>) -> Result<Vec<Account>> {
        let page_size = self.config.scan_page_size;
        let mut accounts: Vec<Account> = Vec::new();
        loop {
            let after = accounts.last().map(|a| a.id.clone());
            let page = self
                .store
                .list_accounts(status, after.as_deref(), page_size)
                .await?;
            let last_page = (page.len() as i64) < page_size;
            accounts.extend(page);
            if last_page {
                return Ok(accounts);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio_test::{assert_err, assert_ok};

    use crate::api::StaticSignals;
    use crate::db::Database;
    use crate::engine::FixedPnl;
    use crate::models::{Recommendation, Role};

    struct StubQuotes {
        price: Decimal,
        age_secs: i64,
        fail: bool,
    }

    impl StubQuotes {
        fn at(price: Decimal) -> Self {
            Self {
                price,
                age_secs: 0,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl QuoteSource for StubQuotes {
        async fn get_quote(&self, symbol: &str, market: Market) -> Result<Quote> {
            if self.fail {
                return Err(DeskError::QuoteUnavailable {
                    symbol: symbol.to_string(),
                    market,
                    reason: "feed down".to_string(),
                });
            }
            Ok(Quote {
                symbol: symbol.to_uppercase(),
                market,
                price: self.price,
                history: Vec::new(),
                change_percent: Decimal::ZERO,
                as_of: Utc::now() - Duration::seconds(self.age_secs),
            })
        }
    }

    /// Store that lets another writer slip in before the first N trade commits.
    struct RacingStore {
        inner: Database,
        races: AtomicU32,
    }

    #[async_trait]
    impl AccountStore for RacingStore {
        async fn create_account(&self, account: &Account) -> Result<()> {
            self.inner.create_account(account).await
        }
        async fn load_account(&self, id: &str) -> Result<Option<Account>> {
            self.inner.load_account(id).await
        }
        async fn load_active_account(&self, owner_id: &str) -> Result<Option<Account>> {
            self.inner.load_active_account(owner_id).await
        }
        async fn latest_account(&self, owner_id: &str) -> Result<Option<Account>> {
            self.inner.latest_account(owner_id).await
        }
        async fn list_accounts(
            &self,
            status: Option<ChallengeStatus>,
            after_id: Option<&str>,
            limit: i64,
        ) -> Result<Vec<Account>> {
            self.inner.list_accounts(status, after_id, limit).await
        }
        async fn save_account(&self, account: &Account) -> Result<Account> {
            self.inner.save_account(account).await
        }
        async fn append_trade(&self, trade: &Trade) -> Result<()> {
            self.inner.append_trade(trade).await
        }
        async fn commit_trade(&self, account: &Account, trade: &Trade) -> Result<Account> {
            if self.races.load(Ordering::SeqCst) > 0 {
                self.races.fetch_sub(1, Ordering::SeqCst);
                // A concurrent writer moves the balance first.
                if let Some(mut fresh) = self.inner.load_account(&account.id).await? {
                    fresh.current_balance -= dec!(100);
                    self.inner.save_account(&fresh).await?;
                }
            }
            self.inner.commit_trade(account, trade).await
        }
        async fn list_trades(&self, account_id: &str, limit: i64) -> Result<Vec<Trade>> {
            self.inner.list_trades(account_id, limit).await
        }
    }

    async fn desk_with(store: Arc<dyn AccountStore>, quotes: StubQuotes, draw: Decimal) -> ChallengeDesk {
        desk_configured(DeskConfig::default(), store, quotes, draw)
    }

    fn desk_configured(
        config: DeskConfig,
        store: Arc<dyn AccountStore>,
        quotes: StubQuotes,
        draw: Decimal,
    ) -> ChallengeDesk {
        ChallengeDesk::new(
            config,
            store,
            Arc::new(quotes),
            Arc::new(StaticSignals),
            Arc::new(FixedPnl(PnlDraw::fraction(draw))),
        )
    }

    async fn desk(quotes: StubQuotes, draw: Decimal) -> ChallengeDesk {
        let db = Database::new("sqlite::memory:").await.unwrap();
        desk_with(Arc::new(db), quotes, draw).await
    }

    fn order(symbol: &str, market: Market, side: TradeSide, quantity: Decimal) -> TradeRequest {
        TradeRequest {
            symbol: symbol.to_string(),
            market,
            side,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_large_buy_fails_challenge_on_daily_loss() {
        let desk = desk(StubQuotes::at(dec!(450)), Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        assert_ok!(desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await);

        let receipt = desk
            .place_trade(&trader, &order("BTCUSD", Market::Crypto, TradeSide::Buy, dec!(10)))
            .await
            .unwrap();

        assert_eq!(receipt.account.current_balance, dec!(500));
        assert_eq!(receipt.account.status, ChallengeStatus::Failed);
        assert_eq!(receipt.account.fail_reason, Some(FailReason::DailyLossExceeded));
        assert_eq!(receipt.account.version, 1);
        assert_eq!(receipt.attempts, 1);

        // No active challenge left to trade on.
        let err = assert_err!(
            desk.place_trade(&trader, &order("BTCUSD", Market::Crypto, TradeSide::Buy, dec!(1)))
                .await
        );
        assert!(matches!(err, DeskError::NoActiveChallenge { .. }));

        let history = desk.history(&trader, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, receipt.trade.id);
    }

    #[tokio::test]
    async fn test_profitable_sell_passes_challenge() {
        let desk = desk(StubQuotes::at(dec!(125)), dec!(-0.04)).await;
        let trader = Actor::trader("t@example.com");
        desk.purchase(&trader, Tier::Starter, PaymentMethod::Crypto).await.unwrap();

        let receipt = desk
            .place_trade(&trader, &order("aapl", Market::UsStock, TradeSide::Sell, dec!(5)))
            .await
            .unwrap();

        assert_eq!(receipt.trade.symbol, "AAPL");
        assert_eq!(receipt.trade.realized_pnl, dec!(-25));
        assert_eq!(receipt.account.current_balance, dec!(5600));
        assert_eq!(receipt.account.status, ChallengeStatus::Passed);
        assert_eq!(receipt.account.profit_percent, dec!(12));

        let board = desk.leaderboard(None).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].owner_id, "t@example.com");
    }

    #[tokio::test]
    async fn test_second_purchase_rejected_while_active() {
        let desk = desk(StubQuotes::at(dec!(100)), Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        let first = desk.purchase(&trader, Tier::Pro, PaymentMethod::Cmi).await.unwrap();

        let err = desk
            .purchase(&trader, Tier::Elite, PaymentMethod::Cmi)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::ActiveChallengeExists { ref account_id, .. } if *account_id == first.id));
    }

    #[tokio::test]
    async fn test_order_validation() {
        let desk = desk(StubQuotes::at(dec!(450)), Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();

        let err = desk
            .place_trade(&trader, &order("FOO", Market::Crypto, TradeSide::Buy, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::UnknownInstrument { .. }));

        let err = desk
            .place_trade(&trader, &order("BTCUSD", Market::Crypto, TradeSide::Buy, dec!(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::InsufficientBalance { required, .. } if required == dec!(9000)));

        let err = desk
            .place_trade(&trader, &order("BTCUSD", Market::Crypto, TradeSide::Sell, dec!(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Engine(EngineError::InvalidTrade(_))));

        // Nothing was booked.
        assert!(desk.history(&trader, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_order_is_rejected_not_booked() {
        let desk = desk(StubQuotes::at(dec!(2)), Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();

        let err = desk
            .place_trade(&trader, &order("BTCUSD", Market::Crypto, TradeSide::Buy, Decimal::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Engine(EngineError::InvalidTrade(_))));

        let account = desk.latest_account(&trader).await.unwrap().unwrap();
        assert_eq!(account.current_balance, dec!(5000));
        assert_eq!(account.status, ChallengeStatus::Active);
        assert!(desk.history(&trader, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_or_missing_quote_blocks_trading() {
        let stale = StubQuotes {
            price: dec!(100),
            age_secs: 3600,
            fail: false,
        };
        let desk = desk(stale, Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();

        let err = desk
            .place_trade(&trader, &order("IAM", Market::Morocco, TradeSide::Buy, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::QuoteUnavailable { ref reason, .. } if reason.starts_with("stale")));

        let down = StubQuotes {
            price: dec!(100),
            age_secs: 0,
            fail: true,
        };
        let desk = self::desk(down, Decimal::ZERO).await;
        desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();
        let err = desk
            .place_trade(&trader, &order("IAM", Market::Morocco, TradeSide::Buy, dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::QuoteUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_conflict_is_retried_against_fresh_state() {
        let store = RacingStore {
            inner: Database::new("sqlite::memory:").await.unwrap(),
            races: AtomicU32::new(1),
        };
        let desk = desk_with(Arc::new(store), StubQuotes::at(dec!(50)), Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();

        let receipt = desk
            .place_trade(&trader, &order("ETHUSD", Market::Crypto, TradeSide::Buy, dec!(1)))
            .await
            .unwrap();

        // 5000 - 100 (concurrent writer) - 50 (this trade)
        assert_eq!(receipt.attempts, 2);
        assert_eq!(receipt.account.current_balance, dec!(4850));
        assert_eq!(receipt.account.version, 2);
    }

    #[tokio::test]
    async fn test_conflict_gives_up_after_retries() {
        let store = RacingStore {
            inner: Database::new("sqlite::memory:").await.unwrap(),
            races: AtomicU32::new(10),
        };
        let desk = desk_with(Arc::new(store), StubQuotes::at(dec!(50)), Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();

        let err = desk
            .place_trade(&trader, &order("ETHUSD", Market::Crypto, TradeSide::Buy, dec!(1)))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(desk.history(&trader, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_trades_on_one_account_serialize() {
        let desk = desk(StubQuotes::at(dec!(50)), Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();

        let buy = order("SOLUSD", Market::Crypto, TradeSide::Buy, dec!(1));
        let (a, b) = tokio::join!(desk.place_trade(&trader, &buy), desk.place_trade(&trader, &buy));
        assert_ok!(a);
        assert_ok!(b);

        let dashboard = desk.dashboard(&trader, None, Market::Crypto).await.unwrap();
        let account = dashboard.account.unwrap();
        assert_eq!(account.current_balance, dec!(4900));
        assert_eq!(account.version, 2);
        assert_eq!(dashboard.recent_trades.len(), 2);

        assert!(desk.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_account_locks_are_released() {
        let desk = desk(StubQuotes::at(dec!(50)), Decimal::ZERO).await;
        let admin = Actor::admin("ops@example.com");
        let mut accounts = Vec::new();
        for i in 0..3 {
            let trader = Actor::trader(format!("t{i}@example.com"));
            accounts.push(desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap());
            desk.place_trade(&trader, &order("AAPL", Market::UsStock, TradeSide::Buy, dec!(1)))
                .await
                .unwrap();
            // Failed attempts release too.
            assert_err!(desk.purchase(&trader, Tier::Pro, PaymentMethod::Cmi).await);
            assert_err!(
                desk.place_trade(&trader, &order("AAPL", Market::UsStock, TradeSide::Buy, dec!(1000)))
                    .await
            );
        }
        desk.reset_daily_baselines().await.unwrap();
        desk.override_status(&admin, &accounts[0].id, ChallengeStatus::Passed, None)
            .await
            .unwrap();
        assert_err!(
            desk.override_status(&admin, "missing", ChallengeStatus::Passed, None)
                .await
        );

        assert!(desk.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_scans_cover_every_page() {
        let config = DeskConfig {
            scan_page_size: 2,
            ..DeskConfig::default()
        };
        let db = Database::new("sqlite::memory:").await.unwrap();
        let desk = desk_configured(config, Arc::new(db), StubQuotes::at(dec!(50)), Decimal::ZERO);
        let admin = Actor::admin("ops@example.com");

        let mut ids = Vec::new();
        for i in 0..5 {
            let trader = Actor::trader(format!("t{i}@example.com"));
            let account = desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();
            desk.place_trade(&trader, &order("AAPL", Market::UsStock, TradeSide::Buy, dec!(1)))
                .await
                .unwrap();
            ids.push(account.id);
        }
        for id in &ids[..3] {
            desk.override_status(&admin, id, ChallengeStatus::Passed, None)
                .await
                .unwrap();
        }

        // Two active accounts left, spread over pages of two.
        assert_eq!(desk.reset_daily_baselines().await.unwrap(), 2);

        let stats = desk.platform_stats(&admin).await.unwrap();
        assert_eq!(stats.total_accounts, 5);
        assert_eq!(stats.active_accounts, 2);
        assert_eq!(desk.leaderboard(Some(10)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_daily_reset_moves_baseline() {
        let desk = desk(StubQuotes::at(dec!(50)), Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();
        desk.place_trade(&trader, &order("AAPL", Market::UsStock, TradeSide::Buy, dec!(1)))
            .await
            .unwrap();

        assert_eq!(desk.reset_daily_baselines().await.unwrap(), 1);

        let account = desk.dashboard(&trader, Some("AAPL"), Market::UsStock).await.unwrap().account.unwrap();
        assert_eq!(account.daily_start_balance, dec!(4950));
        assert_eq!(account.initial_balance, dec!(5000));
    }

    #[tokio::test]
    async fn test_override_requires_admin() {
        let desk = desk(StubQuotes::at(dec!(50)), Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        let admin = Actor::admin("ops@example.com");
        let account = desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();

        let err = desk
            .override_status(&trader, &account.id, ChallengeStatus::Passed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Engine(EngineError::Permission { role: Role::Trader })));

        let failed = desk
            .override_status(&admin, &account.id, ChallengeStatus::Failed, None)
            .await
            .unwrap();
        assert_eq!(failed.fail_reason, Some(FailReason::AdministrativeOverride));
        assert_eq!(failed.current_balance, dec!(5000));

        // Failed challenge frees the trader to buy another.
        assert_ok!(desk.purchase(&trader, Tier::Pro, PaymentMethod::Cmi).await);

        let err = desk
            .override_status(&admin, "missing", ChallengeStatus::Passed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_dashboard_degrades_without_quotes() {
        let down = StubQuotes {
            price: dec!(1),
            age_secs: 0,
            fail: true,
        };
        let desk = desk(down, Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");

        let empty = desk.dashboard(&trader, None, Market::Morocco).await.unwrap();
        assert!(empty.account.is_none());
        assert!(empty.progress.is_none());

        desk.purchase(&trader, Tier::Starter, PaymentMethod::Cmi).await.unwrap();
        let dashboard = desk.dashboard(&trader, None, Market::Morocco).await.unwrap();
        assert!(dashboard.account.is_some());
        assert!(dashboard.quote.is_none());
        assert_eq!(dashboard.signal.map(|s| s.recommendation), Some(Recommendation::Buy));
        assert_eq!(dashboard.progress.map(|p| p.profit_progress), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_platform_stats_admin_only() {
        let desk = desk(StubQuotes::at(dec!(50)), Decimal::ZERO).await;
        let trader = Actor::trader("t@example.com");
        desk.purchase(&trader, Tier::Elite, PaymentMethod::Crypto).await.unwrap();
        desk.purchase(&Actor::trader("u@example.com"), Tier::Starter, PaymentMethod::Cmi)
            .await
            .unwrap();

        assert!(desk.platform_stats(&trader).await.is_err());

        let stats = desk.platform_stats(&Actor::admin("ops@example.com")).await.unwrap();
        assert_eq!(stats.total_accounts, 2);
        assert_eq!(stats.active_accounts, 2);
        assert_eq!(stats.revenue, dec!(1200));
    }
}
