use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Micros, UserId};

pub type WalletId = Uuid;

/// A per-user monetary balance record. Exactly one wallet exists per user,
/// enforced by a uniqueness constraint on `user_id` at the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    /// Current balance in micro-units. Reflects completed credits minus all
    /// debits, including pending reservations.
    pub balance: Micros,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a fresh zero-balance wallet for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance: 0,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_wallet_starts_empty() {
        let user = Uuid::new_v4();
        let wallet = Wallet::new(user);
        assert_eq!(wallet.balance, 0);
        assert_eq!(wallet.user_id, user);
    }
}
