use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::application::BalanceService;
use crate::config::Config;
use crate::domain::{Amount, OrderId, ServiceId, UserId};

/// Riserva - reserve-then-settle user balance ledger
#[derive(Parser)]
#[command(name = "riserva")]
#[command(about = "Manage per-user balances with a reserve-then-settle workflow")]
#[command(version)]
pub struct Cli {
    /// Database file path (defaults to $RISERVA_DB, then riserva.db)
    #[arg(short, long)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Credit a user's spendable balance
    TopUp {
        /// User identifier
        user: UserId,

        /// Amount to credit (positive integer, minor units)
        amount: Amount,
    },

    /// Show a user's spendable and reserved balances
    Balance {
        /// User identifier
        user: UserId,
    },

    /// Reserve funds against a pending order
    Reserve {
        /// User identifier
        user: UserId,

        /// Order identifier
        #[arg(long)]
        order: OrderId,

        /// Service identifier
        #[arg(long)]
        service: ServiceId,

        /// Amount to reserve
        amount: Amount,
    },

    /// Finalize a reservation, consuming the reserved funds
    WriteOff {
        /// User identifier
        user: UserId,

        /// Order identifier
        #[arg(long)]
        order: OrderId,

        /// Service identifier
        #[arg(long)]
        service: ServiceId,

        /// Reserved amount (must match the reservation)
        amount: Amount,
    },

    /// Cancel a reservation, returning funds to the spendable balance
    Release {
        /// User identifier
        user: UserId,

        /// Order identifier
        #[arg(long)]
        order: OrderId,

        /// Service identifier
        #[arg(long)]
        service: ServiceId,

        /// Reserved amount (must match the reservation)
        amount: Amount,
    },

    /// Per-service revenue totals for a calendar month
    Report {
        /// Period token (YYYY-MM)
        period: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show a user's transaction history
    History {
        /// User identifier
        user: UserId,
    },
}

impl Cli {
    fn database_path(&self) -> String {
        self.database
            .clone()
            .unwrap_or_else(|| Config::from_env().database_path)
    }

    pub async fn run(self) -> Result<()> {
        let database = self.database_path();

        match self.command {
            Commands::Init => {
                BalanceService::init(&database).await?;
                println!("Database initialized: {}", database);
            }

            Commands::TopUp { user, amount } => {
                let service = BalanceService::connect(&database).await?;
                let new_balance = service.top_up(user, amount).await?;
                println!("User {} topped up by {}, balance: {}", user, amount, new_balance);
            }

            Commands::Balance { user } => {
                let service = BalanceService::connect(&database).await?;
                let account = service.account(user).await?;
                println!(
                    "User {}: balance {}, reserved {}",
                    account.user_id, account.balance, account.reserved_balance
                );
            }

            Commands::Reserve {
                user,
                order,
                service: service_id,
                amount,
            } => {
                let service = BalanceService::connect(&database).await?;
                service.reserve(user, order, service_id, amount).await?;
                println!(
                    "Reserved {} for user {} (order {}, service {})",
                    amount, user, order, service_id
                );
            }

            Commands::WriteOff {
                user,
                order,
                service: service_id,
                amount,
            } => {
                let service = BalanceService::connect(&database).await?;
                service.write_off(user, order, service_id, amount).await?;
                println!(
                    "Wrote off {} for user {} (order {}, service {})",
                    amount, user, order, service_id
                );
            }

            Commands::Release {
                user,
                order,
                service: service_id,
                amount,
            } => {
                let service = BalanceService::connect(&database).await?;
                service.release(user, order, service_id, amount).await?;
                println!(
                    "Released {} back to user {} (order {}, service {})",
                    amount, user, order, service_id
                );
            }

            Commands::Report { period, format } => {
                let service = BalanceService::connect(&database).await?;
                let report = service.revenue_report(&period).await?;

                if format == "json" {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!(
                        "Revenue {} .. {}",
                        report.period_start.format("%Y-%m-%d"),
                        report.period_end.format("%Y-%m-%d")
                    );
                    for entry in &report.entries {
                        println!("  service {:>6}  {:>12}", entry.service_id, entry.total_amount);
                    }
                    println!("  total {:>20}", report.total());
                }
            }

            Commands::History { user } => {
                let service = BalanceService::connect(&database).await?;
                let records = service.history(user).await?;
                if records.is_empty() {
                    println!("No transactions for user {}", user);
                }
                for record in records {
                    let order = record
                        .order_id
                        .map(|id| format!(" order {}", id))
                        .unwrap_or_default();
                    let svc = record
                        .service_id
                        .map(|id| format!(" service {}", id))
                        .unwrap_or_default();
                    println!(
                        "#{:<6} {:<10} {:>10}{}{}  {}",
                        record.id,
                        record.kind,
                        record.amount,
                        order,
                        svc,
                        record.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }

        Ok(())
    }
}
