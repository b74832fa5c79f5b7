use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, ServiceId};

/// Revenue attributed to one service over a reporting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRevenue {
    pub service_id: ServiceId,
    pub total_amount: Amount,
}

/// Per-service totals of settled (written-off) funds for one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueReport {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub entries: Vec<ServiceRevenue>,
}

impl RevenueReport {
    /// Grand total across all services.
    pub fn total(&self) -> Amount {
        self.entries.iter().map(|entry| entry.total_amount).sum()
    }
}
