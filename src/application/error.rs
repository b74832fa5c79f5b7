use thiserror::Error;

use crate::domain::{Amount, OrderId, ServiceId, UserId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid amount: {0} (must be a positive integer)")]
    InvalidAmount(Amount),

    #[error("Account not found: user {0}")]
    AccountNotFound(UserId),

    #[error("Insufficient funds for user {user_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        balance: Amount,
        required: Amount,
    },

    #[error("Order {order_id} (service {service_id}) is already reserved for user {user_id}")]
    AlreadyReserved {
        user_id: UserId,
        order_id: OrderId,
        service_id: ServiceId,
    },

    #[error("No reservation found for user {user_id}, order {order_id}, service {service_id}")]
    OrderNotFound {
        user_id: UserId,
        order_id: OrderId,
        service_id: ServiceId,
    },

    #[error("Order {order_id} (service {service_id}) for user {user_id} is already settled")]
    AlreadySettled {
        user_id: UserId,
        order_id: OrderId,
        service_id: ServiceId,
    },

    #[error("Amount mismatch for order {order_id}: reserved {reserved}, requested {requested}")]
    AmountMismatch {
        order_id: OrderId,
        reserved: Amount,
        requested: Amount,
    },

    #[error("Invalid report period: {0}")]
    InvalidPeriod(String),

    #[error("Ledger invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Transient storage failure (safe to retry): {0}")]
    TransientStorage(String),

    #[error("Storage error: {0}")]
    Storage(anyhow::Error),
}

impl AppError {
    /// Whether a caller may retry the identical request. True only when the
    /// failed unit of work committed nothing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientStorage(_))
    }
}

/// Storage errors arrive as `anyhow::Error` with context attached; lock
/// contention and pool exhaustion are classified as transient so callers
/// can distinguish retryable failures from terminal business errors.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
            if is_transient(sqlx_err) {
                return AppError::TransientStorage(sqlx_err.to_string());
            }
        }
        AppError::Storage(err)
    }
}

fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => {
            // SQLITE_BUSY (5) and SQLITE_LOCKED (6), primary or extended.
            matches!(
                db.code().as_deref(),
                Some("5") | Some("6") | Some("261") | Some("517")
            ) || db.message().contains("database is locked")
        }
        sqlx::Error::Io(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(AppError::TransientStorage("pool timed out".into()).is_retryable());
        assert!(!AppError::AccountNotFound(1).is_retryable());
        assert!(
            !AppError::InsufficientFunds {
                user_id: 1,
                balance: 50,
                required: 100
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_pool_timeout_classified_as_transient() {
        let err = anyhow::Error::from(sqlx::Error::PoolTimedOut).context("Failed to begin");
        let app_err = AppError::from(err);
        assert!(matches!(app_err, AppError::TransientStorage(_)));
    }
}
