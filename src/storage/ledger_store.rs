use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Micros, Transaction, TransactionId, TransactionKind, TransactionStatus, UserId, Wallet,
    WalletId,
};

use super::MIGRATION_001_LEDGER;

/// One store transaction. Everything executed against it commits or rolls
/// back together; dropping it uncommitted rolls back.
pub type StoreTx<'a> = sqlx::Transaction<'a, Sqlite>;

/// Returns true when the underlying database error is a uniqueness-constraint
/// violation. The engine's ensure-wallet and charge paths use this to detect
/// that a concurrent writer committed first.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}

/// A wallet whose stored balance disagrees with its replayed transaction log.
#[derive(Debug, Clone)]
pub struct BalanceDrift {
    pub wallet_id: WalletId,
    pub user_id: UserId,
    pub stored: Micros,
    pub replayed: Micros,
}

/// Statistics for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub wallet_count: i64,
    pub transaction_count: i64,
    pub drift: Vec<BalanceDrift>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty()
    }
}

/// Store for wallets and their transaction log (the billing database).
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    /// SQLite is single-writer: the pool is capped at one connection so
    /// concurrent store transactions queue rather than abort on lock upgrade.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .context("Failed to connect to billing database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_LEDGER)
            .execute(&self.pool)
            .await
            .context("Failed to run ledger migration")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let store = Self::connect(database_url).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Begin a store transaction.
    pub async fn begin(&self) -> Result<StoreTx<'static>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin store transaction")
    }

    // ========================
    // Wallet operations
    // ========================

    /// Insert a new wallet. Fails with a uniqueness violation if the user
    /// already has one.
    pub async fn insert_wallet(&self, wallet: &Wallet) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, balance_micros, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(wallet.id.to_string())
        .bind(wallet.user_id.to_string())
        .bind(wallet.balance)
        .bind(wallet.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to insert wallet")?;
        Ok(())
    }

    /// Get the wallet owned by a user, if any.
    pub async fn get_wallet_by_user(&self, user_id: &UserId) -> Result<Option<Wallet>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, balance_micros, created_at
            FROM wallets
            WHERE user_id = ?
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch wallet by user")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_wallet(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a wallet by id, reading inside a store transaction.
    pub async fn fetch_wallet(
        &self,
        conn: &mut SqliteConnection,
        id: WalletId,
    ) -> Result<Option<Wallet>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, balance_micros, created_at
            FROM wallets
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch wallet")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_wallet(&row)?)),
            None => Ok(None),
        }
    }

    /// Decrement a wallet's balance if and only if it holds at least `amount`.
    /// Returns false (and writes nothing) when funds are insufficient.
    pub async fn try_reserve_funds(
        &self,
        conn: &mut SqliteConnection,
        wallet_id: WalletId,
        amount: Micros,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET balance_micros = balance_micros - ?
            WHERE id = ? AND balance_micros >= ?
            "#,
        )
        .bind(amount)
        .bind(wallet_id.to_string())
        .bind(amount)
        .execute(&mut *conn)
        .await
        .context("Failed to reserve funds")?;

        Ok(result.rows_affected() == 1)
    }

    /// Increase a wallet's balance.
    pub async fn apply_credit(
        &self,
        conn: &mut SqliteConnection,
        wallet_id: WalletId,
        amount: Micros,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE wallets
            SET balance_micros = balance_micros + ?
            WHERE id = ?
            "#,
        )
        .bind(amount)
        .bind(wallet_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to apply credit")?;
        Ok(())
    }

    // ========================
    // Transaction operations
    // ========================

    /// Insert a new ledger transaction inside a store transaction. Fails
    /// with a uniqueness violation when its operation id is already taken.
    pub async fn insert_transaction(
        &self,
        conn: &mut SqliteConnection,
        txn: &Transaction,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, wallet_id, amount_micros, kind, status, operation_id, refund_of, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(txn.id.to_string())
        .bind(txn.wallet_id.to_string())
        .bind(txn.amount)
        .bind(txn.kind.as_str())
        .bind(txn.status.as_str())
        .bind(&txn.operation_id)
        .bind(txn.refund_of.map(|id| id.to_string()))
        .bind(txn.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to insert transaction")?;
        Ok(())
    }

    /// Get a transaction by id.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(TRANSACTION_SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a transaction by id, reading inside a store transaction.
    pub async fn fetch_transaction(
        &self,
        conn: &mut SqliteConnection,
        id: TransactionId,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(TRANSACTION_SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// Look up a transaction by its operation id inside a store transaction.
    pub async fn find_transaction_by_operation(
        &self,
        conn: &mut SqliteConnection,
        operation_id: &str,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, wallet_id, amount_micros, kind, status, operation_id, refund_of, created_at
            FROM transactions
            WHERE operation_id = ?
            "#,
        )
        .bind(operation_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch transaction by operation id")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// Look up a transaction by its operation id outside any transaction.
    pub async fn get_transaction_by_operation(
        &self,
        operation_id: &str,
    ) -> Result<Option<Transaction>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        self.find_transaction_by_operation(&mut conn, operation_id)
            .await
    }

    /// Advance a transaction's status.
    pub async fn set_transaction_status(
        &self,
        conn: &mut SqliteConnection,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE transactions SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&mut *conn)
            .await
            .context("Failed to update transaction status")?;
        Ok(())
    }

    /// List all transactions for a wallet, oldest first.
    pub async fn list_transactions_for_wallet(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, wallet_id, amount_micros, kind, status, operation_id, refund_of, created_at
            FROM transactions
            WHERE wallet_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(wallet_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for wallet")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    // ========================
    // Integrity operations
    // ========================

    /// Recompute every wallet balance from the transaction log and report
    /// wallets whose stored balance disagrees.
    pub async fn integrity_report(&self) -> Result<IntegrityReport> {
        let wallet_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM wallets")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count wallets")?
            .get("count");

        let transaction_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM transactions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?
            .get("count");

        let rows = sqlx::query(
            r#"
            SELECT
                w.id as wallet_id,
                w.user_id as user_id,
                w.balance_micros as stored,
                COALESCE((
                    SELECT SUM(
                        CASE
                            WHEN t.kind IN ('credit', 'refund_credit') AND t.status = 'completed'
                                THEN t.amount_micros
                            WHEN t.kind = 'debit'
                                THEN -t.amount_micros
                            ELSE 0
                        END
                    )
                    FROM transactions t
                    WHERE t.wallet_id = w.id
                ), 0) as replayed
            FROM wallets w
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to replay wallet balances")?;

        let mut drift = Vec::new();
        for row in rows {
            let stored: Micros = row.get("stored");
            let replayed: Micros = row.get("replayed");
            if stored != replayed {
                let wallet_id_str: String = row.get("wallet_id");
                let user_id_str: String = row.get("user_id");
                drift.push(BalanceDrift {
                    wallet_id: Uuid::parse_str(&wallet_id_str).context("Invalid wallet ID")?,
                    user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
                    stored,
                    replayed,
                });
            }
        }

        Ok(IntegrityReport {
            wallet_count,
            transaction_count,
            drift,
        })
    }

    fn row_to_wallet(row: &sqlx::sqlite::SqliteRow) -> Result<Wallet> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let created_at_str: String = row.get("created_at");

        Ok(Wallet {
            id: Uuid::parse_str(&id_str).context("Invalid wallet ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            balance: row.get("balance_micros"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let wallet_id_str: String = row.get("wallet_id");
        let kind_str: String = row.get("kind");
        let status_str: String = row.get("status");
        let refund_of_str: Option<String> = row.get("refund_of");
        let created_at_str: String = row.get("created_at");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            wallet_id: Uuid::parse_str(&wallet_id_str).context("Invalid wallet ID")?,
            amount: row.get("amount_micros"),
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction kind: {}", kind_str))?,
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?,
            operation_id: row.get("operation_id"),
            refund_of: refund_of_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid refund_of ID")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}

const TRANSACTION_SELECT_BY_ID: &str = r#"
    SELECT id, wallet_id, amount_micros, kind, status, operation_id, refund_of, created_at
    FROM transactions
    WHERE id = ?
"#;
