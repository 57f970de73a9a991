//! Wire contracts for both services: the request and response shapes
//! exchanged with clients and, for wallet initialization, between the two
//! services. Transport framing is a deployment concern; these types pin the
//! JSON bodies.

use serde::{Deserialize, Serialize};

use crate::application::TokenPair;
use crate::domain::{
    Transaction, TransactionId, TransactionKind, TransactionStatus, User, UserId, Wallet, WalletId,
    format_micros,
};

// ========================
// Billing service
// ========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitWalletRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitWalletResponse {
    pub wallet_id: WalletId,
    pub user_id: UserId,
    pub balance: String,
}

impl From<&Wallet> for InitWalletResponse {
    fn from(wallet: &Wallet) -> Self {
        Self {
            wallet_id: wallet.id,
            user_id: wallet.user_id,
            balance: format_micros(wallet.balance),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditRequest {
    pub user_id: UserId,
    /// Decimal string, e.g. "25.500000"
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditResponse {
    pub success: bool,
    pub txn_id: TransactionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub balance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    pub user_id: UserId,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeResponse {
    pub txn_id: TransactionId,
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTransactionRequest {
    pub txn_id: TransactionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTransactionResponse {
    pub success: bool,
    pub txn: TransactionView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundTransactionRequest {
    pub txn_id: TransactionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundTransactionResponse {
    pub success: bool,
}

/// A transaction as rendered on the wire: amounts as decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub amount: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_of: Option<TransactionId>,
}

impl From<&Transaction> for TransactionView {
    fn from(txn: &Transaction) -> Self {
        Self {
            id: txn.id,
            wallet_id: txn.wallet_id,
            amount: format_micros(txn.amount),
            kind: txn.kind,
            status: txn.status,
            operation_id: txn.operation_id.clone(),
            refund_of: txn.refund_of,
        }
    }
}

// ========================
// Auth service
// ========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub email: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: UserView,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_charge_request_wire_shape() {
        let req = ChargeRequest {
            user_id: Uuid::nil(),
            amount: "40.000000".to_string(),
            operation_id: Some("op-a".to_string()),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["userId"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["operationId"], "op-a");
    }

    #[test]
    fn test_transaction_view_renders_amount_as_decimal_string() {
        let txn = Transaction::debit(Uuid::new_v4(), 40_000_000, Some("op-a"));
        let view = TransactionView::from(&txn);
        assert_eq!(view.amount, "40.000000");
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["kind"], "debit");
    }
}
