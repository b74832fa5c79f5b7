use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{
    Account, Amount, OrderId, ReportPeriod, ServiceId, TransactionKind, TransactionRecord, UserId,
};
use crate::storage::Repository;

use super::{AppError, RevenueReport, ServiceRevenue};

/// The balance engine: exposes the ledger operations and enforces all
/// invariants, running each mutation as one atomic unit of work against the
/// account row and the transaction log. This is the primary interface for
/// any client (CLI, API, etc.).
pub struct BalanceService {
    repo: Repository,
}

impl BalanceService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Balance operations
    // ========================

    /// Credit a user's spendable balance, creating the account on first
    /// top-up. Returns the new balance.
    pub async fn top_up(&self, user_id: UserId, amount: Amount) -> Result<Amount, AppError> {
        validate_amount(amount)?;

        let mut uow = self.repo.begin().await?;

        let new_balance = match Repository::account_in(&mut uow, user_id).await? {
            Some(account) => {
                let balance = account.balance + amount;
                Repository::update_balances(&mut uow, user_id, balance, account.reserved_balance)
                    .await?;
                balance
            }
            None => {
                Repository::insert_account(&mut uow, &Account::new(user_id, amount)).await?;
                amount
            }
        };

        Repository::append_record(
            &mut uow,
            TransactionKind::TopUp,
            user_id,
            None,
            None,
            amount,
            Utc::now(),
        )
        .await?;

        uow.commit().await.context("Failed to commit top-up")?;
        info!(user_id, amount, new_balance, "top-up committed");
        Ok(new_balance)
    }

    /// Current spendable balance, excluding reserved funds.
    pub async fn balance(&self, user_id: UserId) -> Result<Amount, AppError> {
        Ok(self.account(user_id).await?.balance)
    }

    /// Full account state (spendable and reserved balances).
    pub async fn account(&self, user_id: UserId) -> Result<Account, AppError> {
        self.repo
            .get_account(user_id)
            .await?
            .ok_or(AppError::AccountNotFound(user_id))
    }

    // ========================
    // Reservation operations
    // ========================

    /// Move funds from spendable to reserved, earmarked for one order/service
    /// pending settlement. Each `(user, order, service)` key may carry at
    /// most one reservation over its lifetime.
    pub async fn reserve(
        &self,
        user_id: UserId,
        order_id: OrderId,
        service_id: ServiceId,
        amount: Amount,
    ) -> Result<(), AppError> {
        validate_amount(amount)?;

        let mut uow = self.repo.begin().await?;

        let account = Repository::account_in(&mut uow, user_id)
            .await?
            .ok_or(AppError::AccountNotFound(user_id))?;

        let records =
            Repository::records_for_order(&mut uow, user_id, order_id, service_id).await?;
        if records.iter().any(|r| r.kind.settles()) {
            return Err(AppError::AlreadySettled {
                user_id,
                order_id,
                service_id,
            });
        }
        if records.iter().any(|r| r.kind == TransactionKind::Reserve) {
            return Err(AppError::AlreadyReserved {
                user_id,
                order_id,
                service_id,
            });
        }

        if !account.can_reserve(amount) {
            return Err(AppError::InsufficientFunds {
                user_id,
                balance: account.balance,
                required: amount,
            });
        }

        Repository::update_balances(
            &mut uow,
            user_id,
            account.balance - amount,
            account.reserved_balance + amount,
        )
        .await?;
        Repository::append_record(
            &mut uow,
            TransactionKind::Reserve,
            user_id,
            Some(order_id),
            Some(service_id),
            amount,
            Utc::now(),
        )
        .await?;

        uow.commit().await.context("Failed to commit reserve")?;
        info!(user_id, order_id, service_id, amount, "reserve committed");
        Ok(())
    }

    /// Finalize a reservation, permanently consuming the reserved funds.
    pub async fn write_off(
        &self,
        user_id: UserId,
        order_id: OrderId,
        service_id: ServiceId,
        amount: Amount,
    ) -> Result<(), AppError> {
        self.settle(user_id, order_id, service_id, amount, TransactionKind::WriteOff)
            .await
    }

    /// Cancel a reservation, returning the funds to the spendable balance.
    pub async fn release(
        &self,
        user_id: UserId,
        order_id: OrderId,
        service_id: ServiceId,
        amount: Amount,
    ) -> Result<(), AppError> {
        self.settle(user_id, order_id, service_id, amount, TransactionKind::Release)
            .await
    }

    /// Close an open reservation. A reservation settles at most once, whether
    /// written off or released; the log is the source of truth for that.
    async fn settle(
        &self,
        user_id: UserId,
        order_id: OrderId,
        service_id: ServiceId,
        amount: Amount,
        kind: TransactionKind,
    ) -> Result<(), AppError> {
        debug_assert!(kind.settles());
        validate_amount(amount)?;

        let mut uow = self.repo.begin().await?;

        let records =
            Repository::records_for_order(&mut uow, user_id, order_id, service_id).await?;
        if records.iter().any(|r| r.kind.settles()) {
            return Err(AppError::AlreadySettled {
                user_id,
                order_id,
                service_id,
            });
        }
        let reservation = records
            .iter()
            .find(|r| r.kind == TransactionKind::Reserve)
            .ok_or(AppError::OrderNotFound {
                user_id,
                order_id,
                service_id,
            })?;
        if reservation.amount != amount {
            return Err(AppError::AmountMismatch {
                order_id,
                reserved: reservation.amount,
                requested: amount,
            });
        }

        let account = Repository::account_in(&mut uow, user_id)
            .await?
            .ok_or_else(|| {
                invariant_violation(format!(
                    "reservation exists for user {user_id} but account row is missing"
                ))
            })?;
        if account.reserved_balance < amount {
            return Err(invariant_violation(format!(
                "reserved balance {} for user {user_id} is below settlement amount {amount}",
                account.reserved_balance
            )));
        }

        let reserved_balance = account.reserved_balance - amount;
        let balance = match kind {
            TransactionKind::Release => account.balance + amount,
            _ => account.balance,
        };

        Repository::update_balances(&mut uow, user_id, balance, reserved_balance).await?;
        Repository::append_record(
            &mut uow,
            kind,
            user_id,
            Some(order_id),
            Some(service_id),
            amount,
            Utc::now(),
        )
        .await?;

        uow.commit().await.context("Failed to commit settlement")?;
        info!(
            user_id,
            order_id,
            service_id,
            amount,
            kind = %kind,
            "settlement committed"
        );
        Ok(())
    }

    // ========================
    // Reporting operations
    // ========================

    /// Per-service totals of written-off funds for a `YYYY-MM` period.
    pub async fn revenue_report(&self, period: &str) -> Result<RevenueReport, AppError> {
        let period = ReportPeriod::parse(period)
            .map_err(|_| AppError::InvalidPeriod(period.to_string()))?;

        let entries = self
            .repo
            .revenue_by_service(&period)
            .await?
            .into_iter()
            .map(|(service_id, total_amount)| ServiceRevenue {
                service_id,
                total_amount,
            })
            .collect();

        Ok(RevenueReport {
            period_start: period.start,
            period_end: period.end,
            entries,
        })
    }

    /// Audit trail for one user, ordered by log id.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<TransactionRecord>, AppError> {
        Ok(self.repo.records_for_user(user_id).await?)
    }
}

fn validate_amount(amount: Amount) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount(amount));
    }
    Ok(())
}

fn invariant_violation(message: String) -> AppError {
    warn!(%message, "ledger invariant violated");
    AppError::InvariantViolation(message)
}
