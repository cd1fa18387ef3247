//! Prop-Trading Challenge Desk
//!
//! Sells simulated trading challenges, books orders against live quotes and
//! evaluates every account against daily-loss, total-loss and profit-target
//! rules.

mod api;
mod config;
mod db;
mod desk;
mod engine;
mod error;
mod metrics;
mod models;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{
    FallbackSignals, IdentityProvider, QuoteClient, SignalClient, SignalSource, StaticIdentity,
    StaticSignals,
};
use crate::config::DeskConfig;
use crate::db::Database;
use crate::desk::ChallengeDesk;
use crate::engine::{PnlModel, RandomPnl, SeededPnl};
use crate::models::{
    Account, ChallengeStatus, FailReason, Market, PaymentMethod, Role, Tier, TradeRequest,
    TradeSide,
};

/// Prop-trading challenge desk CLI.
#[derive(Parser)]
#[command(name = "propdesk")]
#[command(about = "Buy and trade simulated prop-firm challenges", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(short, long, env = "PROPDESK_DATABASE", default_value = "sqlite:./propdesk.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Acting user id
    #[arg(short, long, env = "PROPDESK_ACTOR")]
    actor: Option<String>,

    /// Acting user role (trader, admin)
    #[arg(long, env = "PROPDESK_ROLE", default_value = "trader")]
    role: Role,

    /// Market-data API base URL
    #[arg(long, env = "PROPDESK_QUOTE_API", default_value = "http://localhost:3000/api")]
    quote_api: String,

    /// Signal API base URL (static signals when unset)
    #[arg(long, env = "PROPDESK_SIGNAL_API")]
    signal_api: Option<String>,

    /// Seed the simulated P&L for reproducible sessions
    #[arg(long, env = "PROPDESK_PNL_SEED")]
    pnl_seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show challenge tiers and pricing
    Tiers,

    /// List tradable instruments per market
    Markets,

    /// Buy a new challenge
    Purchase {
        /// Tier (starter, pro, elite)
        tier: Tier,

        /// Payment method (cmi, crypto)
        #[arg(short, long, default_value = "cmi")]
        payment: PaymentMethod,
    },

    /// Place a market order on your active challenge
    Trade {
        /// buy or sell
        side: TradeSide,

        /// Instrument symbol (e.g. BTCUSD, AAPL, IAM)
        symbol: String,

        /// Units to trade
        quantity: Decimal,

        /// Market (crypto, us_stock, morocco)
        #[arg(short, long, default_value = "crypto")]
        market: Market,
    },

    /// Show your latest challenge
    Status,

    /// Challenge progress with live quote and signal
    Dashboard {
        /// Instrument symbol (defaults to the market's first listing)
        #[arg(short, long)]
        symbol: Option<String>,

        /// Market (crypto, us_stock, morocco)
        #[arg(short, long, default_value = "crypto")]
        market: Market,
    },

    /// List trades on your latest challenge
    History {
        /// Maximum number of trades to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Start a new trading day for every active challenge
    ResetDay,

    /// Force a challenge's status (admin)
    Override {
        /// Account id
        account: String,

        /// New status (active, failed, passed)
        status: ChallengeStatus,

        /// Fail reason (daily, total, manual)
        #[arg(short, long)]
        reason: Option<FailReason>,
    },

    /// Show funded traders ranked by profit
    Leaderboard {
        /// Number of entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Platform statistics (admin)
    Stats,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = DeskConfig {
        database_url: cli.database.clone(),
        quote_api_url: cli.quote_api.clone(),
        signal_api_url: cli.signal_api.clone(),
        ..DeskConfig::default()
    };
    if let Err(e) = config.validate() {
        bail!("Invalid configuration: {}", e);
    }

    match cli.command {
        Commands::Tiers => {
            println!("\n{:<10} {:>12} {:>16}", "TIER", "FEE (MAD)", "BALANCE");
            println!("{}", "-".repeat(40));
            for tier in Tier::ALL {
                println!("{:<10} {:>12} {:>16}", tier.as_str(), tier.fee(), tier.initial_balance());
            }
            return Ok(());
        }
        Commands::Markets => {
            for market in Market::ALL {
                println!("\n{} ({})", market, market.currency_symbol().trim());
                for instrument in market.instruments() {
                    println!("  {:<10} {}", instrument.symbol, instrument.name);
                }
            }
            return Ok(());
        }
        Commands::Config => {
            print_config(&config);
            return Ok(());
        }
        _ => {}
    }

    let identity = StaticIdentity::new(cli.actor.clone(), cli.role);
    let actor = identity.current_actor().context("Cannot act without an identity")?;

    let desk = build_desk(&config, cli.pnl_seed).await?;

    match cli.command {
        Commands::Purchase { tier, payment } => {
            let account = desk.purchase(&actor, tier, payment).await?;

            println!("Challenge purchased: {}", account.id);
            println!("  Tier:     {}", account.tier);
            println!("  Paid:     {} MAD via {}", account.amount_paid, account.payment_method.as_str());
            println!("  Balance:  ${}", account.initial_balance);
        }

        Commands::Trade {
            side,
            symbol,
            quantity,
            market,
        } => {
            info!(actor = %actor.id, side = %side, symbol = %symbol, quantity = %quantity, "Submitting order");

            let request = TradeRequest {
                symbol,
                market,
                side,
                quantity,
            };
            let receipt = desk.place_trade(&actor, &request).await?;
            let trade = &receipt.trade;
            let currency = trade.market.currency_symbol();

            println!(
                "{} {} {} @ {}{} (notional {}{})",
                trade.side.as_str().to_uppercase(),
                trade.quantity,
                trade.symbol,
                currency,
                trade.execution_price,
                currency,
                trade.notional.round_dp(2)
            );
            if trade.side == TradeSide::Sell {
                println!("Simulated P&L: {}{}", currency, trade.realized_pnl.round_dp(2));
            }
            print_account(&receipt.account);
        }

        Commands::Status => match desk.latest_account(&actor).await? {
            Some(account) => print_account(&account),
            None => println!("No challenge found. Use 'propdesk purchase <tier>' to start one."),
        },

        Commands::Dashboard { symbol, market } => {
            let dashboard = desk.dashboard(&actor, symbol.as_deref(), market).await?;

            let Some(account) = &dashboard.account else {
                println!("No challenge found. Use 'propdesk purchase <tier>' to start one.");
                return Ok(());
            };
            print_account(account);

            if let Some(progress) = &dashboard.progress {
                println!("\n--- Progress ---");
                println!("Profit Target:  {:>6.1}%", progress.profit_progress);
                println!("Daily Loss:     {:>6.1}%  ({:.2}% lost)", progress.daily_loss_progress, progress.daily_loss_percent);
                println!("Total Loss:     {:>6.1}%  ({:.2}% lost)", progress.total_loss_progress, progress.total_loss_percent);
                println!("Risk Level:     {}", progress.risk_level);
                for warning in &progress.warnings {
                    println!("  ! {}", warning);
                }
            }

            println!("\n--- Market ---");
            match &dashboard.quote {
                Some(quote) => println!(
                    "{} ({}): {}{} ({:+.2}%)",
                    quote.symbol,
                    quote.market,
                    quote.market.currency_symbol(),
                    quote.price,
                    quote.change_percent
                ),
                None => println!("Quote unavailable"),
            }
            if let Some(signal) = &dashboard.signal {
                println!("Signal: {} - {}", signal.recommendation, signal.rationale);
            }

            if !dashboard.recent_trades.is_empty() {
                println!("\n--- Recent Trades ---");
                for trade in &dashboard.recent_trades {
                    println!(
                        "  {} {:<4} {:>10} {:<9} @ {}",
                        trade.timestamp.format("%Y-%m-%d %H:%M"),
                        trade.side.as_str(),
                        trade.quantity,
                        trade.symbol,
                        trade.execution_price
                    );
                }
            }
        }

        Commands::History { limit } => {
            let trades = desk.history(&actor, limit).await?;

            if trades.is_empty() {
                println!("No trades yet.");
                return Ok(());
            }

            println!(
                "\n{:<17} {:<5} {:<9} {:>10} {:>12} {:>12} {:>10}",
                "TIME", "SIDE", "SYMBOL", "QTY", "PRICE", "NOTIONAL", "NET"
            );
            println!("{}", "-".repeat(81));

            for trade in trades {
                println!(
                    "{:<17} {:<5} {:<9} {:>10} {:>12} {:>12} {:>10}",
                    trade.timestamp.format("%Y-%m-%d %H:%M"),
                    trade.side.as_str(),
                    trade.symbol,
                    trade.quantity,
                    trade.execution_price.round_dp(2),
                    trade.notional.round_dp(2),
                    trade.balance_delta().round_dp(2)
                );
            }
        }

        Commands::ResetDay => {
            let count = desk.reset_daily_baselines().await?;
            println!("Reset daily baseline on {} active challenge(s)", count);
        }

        Commands::Override {
            account,
            status,
            reason,
        } => {
            let updated = desk.override_status(&actor, &account, status, reason).await?;
            println!("Account {} is now {}", updated.id, updated.status);
            if let Some(reason) = updated.fail_reason {
                println!("Reason: {}", reason);
            }
        }

        Commands::Leaderboard { limit } => {
            let entries = desk.leaderboard(limit).await?;

            if entries.is_empty() {
                println!("No funded traders yet.");
                return Ok(());
            }

            println!("\n{:>4} {:<32} {:<8} {:>10} {:>14}", "RANK", "TRADER", "TIER", "PROFIT", "BALANCE");
            println!("{}", "-".repeat(72));
            for entry in entries {
                println!(
                    "{:>4} {:<32} {:<8} {:>9.2}% {:>14}",
                    entry.rank,
                    truncate(&entry.owner_id, 30),
                    entry.tier.as_str(),
                    entry.profit_percent,
                    entry.current_balance.round_dp(2)
                );
            }
        }

        Commands::Stats => {
            let stats = desk.platform_stats(&actor).await?;

            println!("\n=== Platform Statistics ===");
            println!("Challenges sold:  {}", stats.total_accounts);
            println!("  Active:         {}", stats.active_accounts);
            println!("  Failed:         {}", stats.failed_accounts);
            println!("  Passed:         {}", stats.passed_accounts);
            println!("Revenue:          {} MAD", stats.revenue);
            println!("Pass Rate:        {:.1}%", stats.pass_rate * 100.0);
            println!("Mean Profit:      {:.2}%", stats.mean_profit_percent);
            println!("Profit Std Dev:   {:.2}%", stats.profit_percent_std_dev);
        }

        Commands::Tiers | Commands::Markets | Commands::Config => {}
    }

    Ok(())
}

/// Wire the desk to its collaborators.
async fn build_desk(config: &DeskConfig, pnl_seed: Option<u64>) -> Result<ChallengeDesk> {
    let store = Database::new(&config.database_url)
        .await
        .context("Failed to open account store")?;

    let quotes = QuoteClient::with_timeouts(
        config.quote_api_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
        Duration::from_secs(config.quote_retry_window_secs),
    )?;

    let signals = match &config.signal_api_url {
        Some(url) => {
            let live: Arc<dyn SignalSource> = Arc::new(SignalClient::new(url.clone())?);
            FallbackSignals::new(Some(live), Arc::new(StaticSignals))
        }
        None => FallbackSignals::offline(),
    };

    let pnl: Arc<dyn PnlModel> = match pnl_seed {
        Some(seed) => Arc::new(SeededPnl::new(seed)),
        None => Arc::new(RandomPnl),
    };

    Ok(ChallengeDesk::new(
        config.clone(),
        Arc::new(store),
        Arc::new(quotes),
        Arc::new(signals),
        pnl,
    ))
}

fn print_account(account: &Account) {
    println!("\n=== Challenge {} ===", account.id);
    println!("Owner:          {}", account.owner_id);
    println!("Tier:           {}", account.tier);
    println!("Status:         {}", account.status.as_str().to_uppercase());
    if let Some(reason) = account.fail_reason {
        println!("Fail Reason:    {}", reason);
    }
    if account.status.is_terminal() {
        println!("Trading:        closed");
    }
    println!("Balance:        ${}", account.current_balance.round_dp(2));
    println!("Initial:        ${}", account.initial_balance);
    println!("Day Start:      ${}", account.daily_start_balance.round_dp(2));
    println!("High-Water:     ${}", account.highest_balance.round_dp(2));
    println!("Profit:         {:.2}%", account.profit_percent);
}

fn print_config(config: &DeskConfig) {
    let rules = &config.rules;

    println!("\n=== Challenge Rules ===\n");
    println!("  Max Daily Loss:       {}%", rules.max_daily_loss_pct);
    println!("  Max Total Loss:       {}%", rules.max_total_loss_pct);
    println!("  Profit Target:        {}%", rules.profit_target_pct);
    println!(
        "  Sell P&L Band:        [{}%, {}%] of notional",
        rules.pnl_floor() * Decimal::ONE_HUNDRED,
        rules.pnl_ceiling() * Decimal::ONE_HUNDRED
    );

    println!("\n=== Desk ===\n");
    println!("  Database:             {}", config.database_url);
    println!("  Quote API:            {}", config.quote_api_url);
    println!(
        "  Signal API:           {}",
        config.signal_api_url.as_deref().unwrap_or("(static signals)")
    );
    println!("  Request Timeout:      {}s", config.request_timeout_secs);
    println!("  Max Quote Age:        {}s", config.max_quote_age_secs);
    println!("  Conflict Retries:     {}", config.max_conflict_retries);
    println!("  Scan Page Size:       {}", config.scan_page_size);
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
