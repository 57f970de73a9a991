use thiserror::Error;

use crate::domain::{Micros, TransactionId, UserId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No wallet exists for user {0}")]
    WalletNotFound(UserId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Insufficient funds for user {user_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        balance: Micros,
        required: Micros,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transaction {0} cannot be refunded: only debits are refundable")]
    NotRefundable(TransactionId),

    #[error("An identity already exists for {0}")]
    DuplicateIdentity(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Wallet provisioning failed, registration rolled back: {0}")]
    ProvisioningFailed(String),

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Business-rule and validation failures a caller can correct; the
    /// 4xx-equivalent half of the taxonomy.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::WalletNotFound(_)
                | AppError::TransactionNotFound(_)
                | AppError::InsufficientFunds { .. }
                | AppError::InvalidAmount(_)
                | AppError::InvalidRequest(_)
                | AppError::NotRefundable(_)
                | AppError::DuplicateIdentity(_)
                | AppError::InvalidCredentials
        )
    }
}
