use serde::{Deserialize, Serialize};

pub type UserId = i64;

/// Money is represented as integer minor units to avoid floating-point
/// precision issues. All amounts flowing through the ledger are positive;
/// balances are never negative.
pub type Amount = i64;

/// A user's balance row. `balance` is spendable; `reserved_balance` is the
/// aggregate of all open reservations, earmarked for in-flight orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub balance: Amount,
    pub reserved_balance: Amount,
}

impl Account {
    /// Create a fresh account, as materialized by a first top-up.
    pub fn new(user_id: UserId, balance: Amount) -> Self {
        Self {
            user_id,
            balance,
            reserved_balance: 0,
        }
    }

    pub fn can_reserve(&self, amount: Amount) -> bool {
        self.balance >= amount
    }

    /// Total funds held for the user, spendable or reserved.
    pub fn total(&self) -> Amount {
        self.balance + self.reserved_balance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_has_no_reservation() {
        let account = Account::new(1, 200);
        assert_eq!(account.balance, 200);
        assert_eq!(account.reserved_balance, 0);
        assert_eq!(account.total(), 200);
    }

    #[test]
    fn test_can_reserve_up_to_balance() {
        let account = Account::new(1, 100);
        assert!(account.can_reserve(100));
        assert!(!account.can_reserve(101));
    }
}
