//! Account store: durable challenge and trade records.
//!
//! Accounts carry a `version` column. Every save is a compare-and-swap on
//! that column, so two writers that loaded the same state cannot both land:
//! the second gets [`DeskError::Conflict`] and must re-evaluate from fresh
//! state. Trades are append-only and keyed by their id.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{debug, info};

use crate::error::{DeskError, Result};
use crate::models::{Account, ChallengeStatus, Trade};

/// Storage contract the desk depends on.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a freshly opened account.
    async fn create_account(&self, account: &Account) -> Result<()>;

    async fn load_account(&self, id: &str) -> Result<Option<Account>>;

    /// The owner's active challenge, if any.
    async fn load_active_account(&self, owner_id: &str) -> Result<Option<Account>>;

    /// The owner's most recently opened challenge, whatever its status.
    async fn latest_account(&self, owner_id: &str) -> Result<Option<Account>>;

    /// One page of accounts ordered by id, optionally filtered by status.
    ///
    /// Pass the last id of the previous page as `after_id` to continue. The
    /// cursor stays valid while rows are inserted or change status.
    async fn list_accounts(
        &self,
        status: Option<ChallengeStatus>,
        after_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Account>>;

    /// Persist the mutable fields of `account` if nobody saved since it was loaded.
    ///
    /// Returns the stored account with its bumped version.
    async fn save_account(&self, account: &Account) -> Result<Account>;

    /// Append a trade record. Appending an id that already exists is a no-op.
    async fn append_trade(&self, trade: &Trade) -> Result<()>;

    /// Save `account` and append `trade` in one transaction.
    async fn commit_trade(&self, account: &Account, trade: &Trade) -> Result<Account>;

    /// Trades for an account, newest first.
    async fn list_trades(&self, account_id: &str, limit: i64) -> Result<Vec<Trade>>;
}

/// Stored challenge row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredAccount {
    pub id: String,
    pub owner_id: String,
    pub tier: String,
    pub initial_balance: String,
    pub daily_start_balance: String,
    pub current_balance: String,
    pub highest_balance: String,
    pub profit_percent: String,
    pub status: String,
    pub fail_reason: Option<String>,
    pub amount_paid: String,
    pub payment_method: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored trade row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTrade {
    pub id: String,
    pub account_id: String,
    pub owner_id: String,
    pub symbol: String,
    pub market: String,
    pub side: String,
    pub quantity: String,
    pub execution_price: String,
    pub notional: String,
    pub realized_pnl: String,
    pub timestamp: DateTime<Utc>,
}

fn parse_field<T: FromStr>(field: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| DeskError::CorruptRecord(format!("{field} = {value:?}: {e}")))
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| DeskError::CorruptRecord(format!("{field} = {value:?}: {e}")))
}

impl TryFrom<StoredAccount> for Account {
    type Error = DeskError;

    fn try_from(row: StoredAccount) -> Result<Self> {
        Ok(Account {
            tier: parse_field("tier", &row.tier)?,
            initial_balance: parse_decimal("initial_balance", &row.initial_balance)?,
            daily_start_balance: parse_decimal("daily_start_balance", &row.daily_start_balance)?,
            current_balance: parse_decimal("current_balance", &row.current_balance)?,
            highest_balance: parse_decimal("highest_balance", &row.highest_balance)?,
            profit_percent: parse_decimal("profit_percent", &row.profit_percent)?,
            status: parse_field("status", &row.status)?,
            fail_reason: row
                .fail_reason
                .as_deref()
                .map(|r| parse_field("fail_reason", r))
                .transpose()?,
            amount_paid: parse_decimal("amount_paid", &row.amount_paid)?,
            payment_method: parse_field("payment_method", &row.payment_method)?,
            id: row.id,
            owner_id: row.owner_id,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<StoredTrade> for Trade {
    type Error = DeskError;

    fn try_from(row: StoredTrade) -> Result<Self> {
        Ok(Trade {
            market: parse_field("market", &row.market)?,
            side: parse_field("side", &row.side)?,
            quantity: parse_decimal("quantity", &row.quantity)?,
            execution_price: parse_decimal("execution_price", &row.execution_price)?,
            notional: parse_decimal("notional", &row.notional)?,
            realized_pnl: parse_decimal("realized_pnl", &row.realized_pnl)?,
            id: row.id,
            account_id: row.account_id,
            owner_id: row.owner_id,
            symbol: row.symbol,
            timestamp: row.timestamp,
        })
    }
}

/// SQLite-backed account store.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        // Every connection to an in-memory database gets its own empty database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        info!(url = %database_url, "Account store ready");
        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS challenges (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                tier TEXT NOT NULL,
                initial_balance TEXT NOT NULL,
                daily_start_balance TEXT NOT NULL,
                current_balance TEXT NOT NULL,
                highest_balance TEXT NOT NULL,
                profit_percent TEXT NOT NULL DEFAULT '0',
                status TEXT NOT NULL DEFAULT 'active',
                fail_reason TEXT,
                amount_paid TEXT NOT NULL,
                payment_method TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                market TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity TEXT NOT NULL,
                execution_price TEXT NOT NULL,
                notional TEXT NOT NULL,
                realized_pnl TEXT NOT NULL DEFAULT '0',
                timestamp TEXT NOT NULL,
                FOREIGN KEY (account_id) REFERENCES challenges(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_challenges_owner ON challenges(owner_id, status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_account ON trades(account_id, timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Whether an account row exists at all.
    async fn account_exists(&self, id: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM challenges WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Classify a compare-and-swap miss.
    async fn save_miss(&self, account_id: &str) -> DeskError {
        match self.account_exists(account_id).await {
            Ok(true) => DeskError::Conflict {
                account_id: account_id.to_string(),
            },
            Ok(false) => DeskError::AccountNotFound(account_id.to_string()),
            Err(e) => e,
        }
    }
}

const UPDATE_ACCOUNT_SQL: &str = r#"
    UPDATE challenges SET
        daily_start_balance = ?,
        current_balance = ?,
        highest_balance = ?,
        profit_percent = ?,
        status = ?,
        fail_reason = ?,
        version = version + 1,
        updated_at = ?
    WHERE id = ? AND version = ?
"#;

const INSERT_TRADE_SQL: &str = r#"
    INSERT OR IGNORE INTO trades (
        id, account_id, owner_id, symbol, market, side,
        quantity, execution_price, notional, realized_pnl, timestamp
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

fn update_account_query<'q>(
    account: &'q Account,
    now: DateTime<Utc>,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    sqlx::query(UPDATE_ACCOUNT_SQL)
        .bind(account.daily_start_balance.to_string())
        .bind(account.current_balance.to_string())
        .bind(account.highest_balance.to_string())
        .bind(account.profit_percent.to_string())
        .bind(account.status.as_str())
        .bind(account.fail_reason.map(|r| r.as_str()))
        .bind(now)
        .bind(account.id.as_str())
        .bind(account.version)
}

fn insert_trade_query(
    trade: &Trade,
) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(INSERT_TRADE_SQL)
        .bind(trade.id.as_str())
        .bind(trade.account_id.as_str())
        .bind(trade.owner_id.as_str())
        .bind(trade.symbol.as_str())
        .bind(trade.market.as_str())
        .bind(trade.side.as_str())
        .bind(trade.quantity.to_string())
        .bind(trade.execution_price.to_string())
        .bind(trade.notional.to_string())
        .bind(trade.realized_pnl.to_string())
        .bind(trade.timestamp)
}

fn saved(account: &Account, now: DateTime<Utc>) -> Account {
    let mut stored = account.clone();
    stored.version += 1;
    stored.updated_at = now;
    stored
}

#[async_trait]
impl AccountStore for Database {
    async fn create_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO challenges (
                id, owner_id, tier, initial_balance, daily_start_balance,
                current_balance, highest_balance, profit_percent, status, fail_reason,
                amount_paid, payment_method, version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.owner_id)
        .bind(account.tier.as_str())
        .bind(account.initial_balance.to_string())
        .bind(account.daily_start_balance.to_string())
        .bind(account.current_balance.to_string())
        .bind(account.highest_balance.to_string())
        .bind(account.profit_percent.to_string())
        .bind(account.status.as_str())
        .bind(account.fail_reason.map(|r| r.as_str()))
        .bind(account.amount_paid.to_string())
        .bind(account.payment_method.as_str())
        .bind(account.version)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(account = %account.id, owner = %account.owner_id, "Account created");
        Ok(())
    }

    async fn load_account(&self, id: &str) -> Result<Option<Account>> {
        sqlx::query_as::<_, StoredAccount>("SELECT * FROM challenges WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn load_active_account(&self, owner_id: &str) -> Result<Option<Account>> {
        sqlx::query_as::<_, StoredAccount>(
            "SELECT * FROM challenges WHERE owner_id = ? AND status = 'active' ORDER BY created_at DESC LIMIT 1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Account::try_from)
        .transpose()
    }

    async fn latest_account(&self, owner_id: &str) -> Result<Option<Account>> {
        sqlx::query_as::<_, StoredAccount>(
            "SELECT * FROM challenges WHERE owner_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Account::try_from)
        .transpose()
    }

    async fn list_accounts(
        &self,
        status: Option<ChallengeStatus>,
        after_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Account>> {
        let after_id = after_id.unwrap_or("");
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, StoredAccount>(
                    "SELECT * FROM challenges WHERE status = ? AND id > ? ORDER BY id LIMIT ?",
                )
                .bind(status.as_str())
                .bind(after_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, StoredAccount>(
                    "SELECT * FROM challenges WHERE id > ? ORDER BY id LIMIT ?",
                )
                .bind(after_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(Account::try_from).collect()
    }

    async fn save_account(&self, account: &Account) -> Result<Account> {
        let now = Utc::now();
        let result = update_account_query(account, now).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(self.save_miss(&account.id).await);
        }
        Ok(saved(account, now))
    }

    async fn append_trade(&self, trade: &Trade) -> Result<()> {
        insert_trade_query(trade).execute(&self.pool).await?;
        Ok(())
    }

    async fn commit_trade(&self, account: &Account, trade: &Trade) -> Result<Account> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let inserted = insert_trade_query(trade).execute(&mut *tx).await?;
        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DeskError::DuplicateTrade(trade.id.clone()));
        }

        let updated = update_account_query(account, now).execute(&mut *tx).await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.save_miss(&account.id).await);
        }

        tx.commit().await?;
        debug!(account = %account.id, trade = %trade.id, "Trade committed");
        Ok(saved(account, now))
    }

    async fn list_trades(&self, account_id: &str, limit: i64) -> Result<Vec<Trade>> {
        sqlx::query_as::<_, StoredTrade>(
            "SELECT * FROM trades WHERE account_id = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Trade::try_from)
        .collect()
    }
}
