use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Account, Amount, OrderId, RecordId, ReportPeriod, ServiceId, TransactionKind,
    TransactionRecord, UserId,
};

use super::MIGRATION_001_INITIAL;

/// How long a unit of work may wait for the writer connection before the
/// operation aborts with a transient failure.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long SQLite waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// An atomic, isolated group of reads and writes. Commits explicitly;
/// rolls back when dropped, so no exit path can leave partial state.
pub type UnitOfWork = sqlx::Transaction<'static, sqlx::Sqlite>;

/// Repository for persisting account balances and the transaction log.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    ///
    /// The pool is capped at a single connection: SQLite allows one writer
    /// at a time, so units of work serialize on pool acquisition instead of
    /// racing into SQLITE_BUSY. An acquisition timeout bounds how long any
    /// operation can block.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Open a unit of work covering both the account row and the log.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        self.pool
            .begin()
            .await
            .context("Failed to begin unit of work")
    }

    // ========================
    // Account operations
    // ========================

    /// Read an account outside any unit of work (single consistent read).
    pub async fn get_account(&self, user_id: UserId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, reserved_balance
            FROM accounts
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Read an account inside a unit of work, for read-modify-write.
    pub async fn account_in(uow: &mut UnitOfWork, user_id: UserId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, reserved_balance
            FROM accounts
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut **uow)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Insert a fresh account row.
    pub async fn insert_account(uow: &mut UnitOfWork, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (user_id, balance, reserved_balance)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(account.user_id)
        .bind(account.balance)
        .bind(account.reserved_balance)
        .execute(&mut **uow)
        .await
        .context("Failed to insert account")?;
        Ok(())
    }

    /// Overwrite both balance columns for an existing account row.
    pub async fn update_balances(
        uow: &mut UnitOfWork,
        user_id: UserId,
        balance: Amount,
        reserved_balance: Amount,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = ?, reserved_balance = ?
            WHERE user_id = ?
            "#,
        )
        .bind(balance)
        .bind(reserved_balance)
        .bind(user_id)
        .execute(&mut **uow)
        .await
        .context("Failed to update balances")?;

        if result.rows_affected() != 1 {
            anyhow::bail!("No account row updated for user {user_id}");
        }
        Ok(())
    }

    // ========================
    // Transaction log operations
    // ========================

    /// Append one record to the log. Returns the assigned monotonic id.
    pub async fn append_record(
        uow: &mut UnitOfWork,
        kind: TransactionKind,
        user_id: UserId,
        order_id: Option<OrderId>,
        service_id: Option<ServiceId>,
        amount: Amount,
        created_at: DateTime<Utc>,
    ) -> Result<RecordId> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (kind, user_id, order_id, service_id, amount, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(kind.as_str())
        .bind(user_id)
        .bind(order_id)
        .bind(service_id)
        .bind(amount)
        .bind(created_at.to_rfc3339())
        .fetch_one(&mut **uow)
        .await
        .context("Failed to append transaction record")?;

        Ok(row.get("id"))
    }

    /// Fetch all records for a reservation key, inside a unit of work so the
    /// settlement decision and its writes see one consistent log state.
    pub async fn records_for_order(
        uow: &mut UnitOfWork,
        user_id: UserId,
        order_id: OrderId,
        service_id: ServiceId,
    ) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, user_id, order_id, service_id, amount, created_at
            FROM transactions
            WHERE user_id = ? AND order_id = ? AND service_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .bind(order_id)
        .bind(service_id)
        .fetch_all(&mut **uow)
        .await
        .context("Failed to fetch records for order")?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// Full audit trail for a user, ordered by log id.
    pub async fn records_for_user(&self, user_id: UserId) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, user_id, order_id, service_id, amount, created_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch records for user")?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// Sum write-off amounts per service over `[period.start, period.end)`.
    pub async fn revenue_by_service(
        &self,
        period: &ReportPeriod,
    ) -> Result<Vec<(ServiceId, Amount)>> {
        let rows = sqlx::query(
            r#"
            SELECT service_id, SUM(amount) AS total
            FROM transactions
            WHERE kind = ? AND created_at >= ? AND created_at < ?
            GROUP BY service_id
            ORDER BY service_id
            "#,
        )
        .bind(TransactionKind::WriteOff.as_str())
        .bind(period.start.to_rfc3339())
        .bind(period.end.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate revenue")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("service_id"), row.get("total")))
            .collect())
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        Ok(Account {
            user_id: row.get("user_id"),
            balance: row.get("balance"),
            reserved_balance: row.get("reserved_balance"),
        })
    }

    fn row_to_record(row: &SqliteRow) -> Result<TransactionRecord> {
        let kind_str: String = row.get("kind");
        let created_at_str: String = row.get("created_at");

        Ok(TransactionRecord {
            id: row.get("id"),
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            user_id: row.get("user_id"),
            order_id: row.get("order_id"),
            service_id: row.get("service_id"),
            amount: row.get("amount"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
