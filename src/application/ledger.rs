use crate::domain::{Micros, Transaction, TransactionId, TransactionStatus, UserId, Wallet};
use crate::storage::{IntegrityReport, LedgerStore, is_unique_violation};

use super::error::AppError;

/// Result of a refund. On an idempotent replay (the debit was already
/// refunded) `credit` is None and `original` is returned unchanged.
#[derive(Debug)]
pub struct RefundOutcome {
    pub original: Transaction,
    pub credit: Option<Transaction>,
}

/// The billing service's core: wallet balances plus an append-only
/// transaction log, every operation one store transaction.
pub struct LedgerEngine {
    store: LedgerStore,
}

impl LedgerEngine {
    /// Create a new engine over the given store.
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Initialize a new billing database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let store = LedgerStore::init(&db_url).await?;
        Ok(Self::new(store))
    }

    /// Connect to an existing billing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let store = LedgerStore::connect(&db_url).await?;
        Ok(Self::new(store))
    }

    /// Return the wallet for `user_id`, creating a zero-balance one on first
    /// reference. Safe under concurrent first-time calls: the user_id
    /// uniqueness constraint decides the winner and the loser re-reads.
    pub async fn ensure_wallet(&self, user_id: &UserId) -> Result<Wallet, AppError> {
        if let Some(wallet) = self.store.get_wallet_by_user(user_id).await? {
            return Ok(wallet);
        }

        let wallet = Wallet::new(*user_id);
        match self.store.insert_wallet(&wallet).await {
            Ok(()) => {
                tracing::info!(user_id = %user_id, wallet_id = %wallet.id, "wallet created");
                Ok(wallet)
            }
            // A concurrent call created the wallet first; return theirs
            Err(e) if is_unique_violation(&e) => self
                .store
                .get_wallet_by_user(user_id)
                .await?
                .ok_or(AppError::WalletNotFound(*user_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Add funds to a user's wallet. The credit transaction is created
    /// already completed; crediting is assumed caller-deduplicated.
    pub async fn credit(&self, user_id: &UserId, amount: Micros) -> Result<Transaction, AppError> {
        require_positive(amount)?;
        let wallet = self.ensure_wallet(user_id).await?;

        let txn = Transaction::credit(wallet.id, amount);
        let mut tx = self.store.begin().await?;
        self.store.insert_transaction(&mut tx, &txn).await?;
        self.store.apply_credit(&mut tx, wallet.id, amount).await?;
        tx.commit().await.map_err(anyhow::Error::from)?;

        tracing::debug!(user_id = %user_id, txn_id = %txn.id, amount, "credit applied");
        Ok(txn)
    }

    /// Reserve funds from a user's wallet as a pending debit.
    ///
    /// When `operation_id` is supplied the charge is idempotent: a retry
    /// with the same id returns the original transaction without touching
    /// the balance, including under concurrency - the operation lookup and
    /// the balance decrement share one store transaction, and the
    /// operation-id uniqueness constraint breaks ties.
    pub async fn charge(
        &self,
        user_id: &UserId,
        amount: Micros,
        operation_id: Option<&str>,
    ) -> Result<Transaction, AppError> {
        require_positive(amount)?;
        let wallet = self.ensure_wallet(user_id).await?;

        let mut tx = self.store.begin().await?;

        if let Some(op) = operation_id {
            if let Some(existing) = self.store.find_transaction_by_operation(&mut tx, op).await? {
                tx.rollback().await.map_err(anyhow::Error::from)?;
                tracing::debug!(operation_id = op, txn_id = %existing.id, "charge replayed");
                return Ok(existing);
            }
        }

        let reserved = self.store.try_reserve_funds(&mut tx, wallet.id, amount).await?;
        if !reserved {
            let balance = self
                .store
                .fetch_wallet(&mut tx, wallet.id)
                .await?
                .map(|w| w.balance)
                .unwrap_or(0);
            tx.rollback().await.map_err(anyhow::Error::from)?;
            return Err(AppError::InsufficientFunds {
                user_id: *user_id,
                balance,
                required: amount,
            });
        }

        let txn = Transaction::debit(wallet.id, amount, operation_id);
        match self.store.insert_transaction(&mut tx, &txn).await {
            Ok(()) => {}
            Err(e) if is_unique_violation(&e) => {
                // A concurrent charge with the same operation id committed
                // between our lookup and insert; undo the reservation and
                // return the winner's record.
                tx.rollback().await.map_err(anyhow::Error::from)?;
                if let Some(op) = operation_id {
                    if let Some(existing) = self.store.get_transaction_by_operation(op).await? {
                        return Ok(existing);
                    }
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await.map_err(anyhow::Error::from)?;

        tracing::debug!(user_id = %user_id, txn_id = %txn.id, amount, "funds reserved");
        Ok(txn)
    }

    /// Read a user's balance. Returns 0 when no wallet exists; never
    /// creates one.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<Micros, AppError> {
        Ok(self
            .store
            .get_wallet_by_user(user_id)
            .await?
            .map(|w| w.balance)
            .unwrap_or(0))
    }

    /// Settle a pending debit. Completing an already-settled transaction
    /// returns it unchanged; status never moves backward.
    pub async fn complete_transaction(
        &self,
        txn_id: TransactionId,
    ) -> Result<Transaction, AppError> {
        let mut tx = self.store.begin().await?;
        let mut txn = self
            .store
            .fetch_transaction(&mut tx, txn_id)
            .await?
            .ok_or(AppError::TransactionNotFound(txn_id))?;

        match txn.status {
            TransactionStatus::Completed | TransactionStatus::Refunded => {
                tx.rollback().await.map_err(anyhow::Error::from)?;
                Ok(txn)
            }
            TransactionStatus::Pending => {
                self.store
                    .set_transaction_status(&mut tx, txn_id, TransactionStatus::Completed)
                    .await?;
                tx.commit().await.map_err(anyhow::Error::from)?;
                txn.status = TransactionStatus::Completed;
                tracing::debug!(txn_id = %txn_id, "transaction completed");
                Ok(txn)
            }
        }
    }

    /// Refund a debit: mark it refunded and restore the funds through a new
    /// completed credit carrying a back-reference, all in one store
    /// transaction. Refunding an already-refunded debit is a no-op replay.
    /// A still-pending debit may be refunded; that cancels the reservation.
    pub async fn refund_transaction(
        &self,
        txn_id: TransactionId,
    ) -> Result<RefundOutcome, AppError> {
        let mut tx = self.store.begin().await?;
        let mut original = self
            .store
            .fetch_transaction(&mut tx, txn_id)
            .await?
            .ok_or(AppError::TransactionNotFound(txn_id))?;

        if original.status == TransactionStatus::Refunded {
            tx.rollback().await.map_err(anyhow::Error::from)?;
            return Ok(RefundOutcome {
                original,
                credit: None,
            });
        }
        if original.kind.is_credit() {
            tx.rollback().await.map_err(anyhow::Error::from)?;
            return Err(AppError::NotRefundable(txn_id));
        }

        self.store
            .set_transaction_status(&mut tx, txn_id, TransactionStatus::Refunded)
            .await?;
        let credit = Transaction::refund_credit(original.wallet_id, original.amount, original.id);
        self.store.insert_transaction(&mut tx, &credit).await?;
        self.store
            .apply_credit(&mut tx, original.wallet_id, original.amount)
            .await?;
        tx.commit().await.map_err(anyhow::Error::from)?;

        original.status = TransactionStatus::Refunded;
        tracing::info!(txn_id = %txn_id, credit_id = %credit.id, "transaction refunded");
        Ok(RefundOutcome {
            original,
            credit: Some(credit),
        })
    }

    /// List a user's transaction log, oldest first.
    pub async fn transactions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Transaction>, AppError> {
        let wallet = self
            .store
            .get_wallet_by_user(user_id)
            .await?
            .ok_or(AppError::WalletNotFound(*user_id))?;
        Ok(self.store.list_transactions_for_wallet(wallet.id).await?)
    }

    /// Recompute every balance from the log and report drift.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        Ok(self.store.integrity_report().await?)
    }
}

fn require_positive(amount: Micros) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}
