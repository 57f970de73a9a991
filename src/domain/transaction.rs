use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Micros, WalletId};

pub type TransactionId = Uuid;

/// What a transaction does to its wallet's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money entering the wallet
    Credit,
    /// Money reserved or leaving the wallet (a charge)
    Debit,
    /// Money restored by refunding a debit
    RefundCredit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
            TransactionKind::RefundCredit => "refund_credit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(TransactionKind::Credit),
            "debit" => Some(TransactionKind::Debit),
            "refund_credit" => Some(TransactionKind::RefundCredit),
            _ => None,
        }
    }

    /// Returns true for the two kinds that add to the balance.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionKind::Credit | TransactionKind::RefundCredit
        )
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement state. Status only moves forward: pending -> completed,
/// or completed -> refunded. A debit may also go pending -> refunded when
/// a reservation is cancelled before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "refunded" => Some(TransactionStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger entry recording one balance change. Immutable except for the
/// status field, which is only ever advanced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    /// Unsigned magnitude in micro-units (always positive); the kind
    /// carries the sign.
    pub amount: Micros,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    /// Caller-supplied idempotency key, unique across all transactions
    /// when present.
    pub operation_id: Option<String>,
    /// If this is a refund credit, points back at the refunded debit.
    pub refund_of: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// A completed credit, applied immediately.
    pub fn credit(wallet_id: WalletId, amount: Micros) -> Self {
        Self::new(wallet_id, amount, TransactionKind::Credit, TransactionStatus::Completed)
    }

    /// A pending debit reserving funds until completion or refund.
    pub fn debit(wallet_id: WalletId, amount: Micros, operation_id: Option<&str>) -> Self {
        let mut txn = Self::new(
            wallet_id,
            amount,
            TransactionKind::Debit,
            TransactionStatus::Pending,
        );
        txn.operation_id = operation_id.map(str::to_owned);
        txn
    }

    /// The compensating credit created when a debit is refunded.
    pub fn refund_credit(wallet_id: WalletId, amount: Micros, original: TransactionId) -> Self {
        let mut txn = Self::new(
            wallet_id,
            amount,
            TransactionKind::RefundCredit,
            TransactionStatus::Completed,
        );
        txn.refund_of = Some(original);
        txn
    }

    fn new(
        wallet_id: WalletId,
        amount: Micros,
        kind: TransactionKind,
        status: TransactionStatus,
    ) -> Self {
        assert!(amount > 0, "Transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            amount,
            kind,
            status,
            operation_id: None,
            refund_of: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_refund(&self) -> bool {
        self.refund_of.is_some()
    }
}
