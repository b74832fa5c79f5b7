use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, UserId};

pub type OrderId = i64;
pub type ServiceId = i64;
pub type RecordId = i64;

/// The four balance-affecting events the log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    TopUp,
    Reserve,
    WriteOff,
    Release,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::TopUp => "top_up",
            TransactionKind::Reserve => "reserve",
            TransactionKind::WriteOff => "write_off",
            TransactionKind::Release => "release",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "top_up" => Some(TransactionKind::TopUp),
            "reserve" => Some(TransactionKind::Reserve),
            "write_off" => Some(TransactionKind::WriteOff),
            "release" => Some(TransactionKind::Release),
            _ => None,
        }
    }

    /// Returns true if a record of this kind closes a reservation.
    pub fn settles(&self) -> bool {
        matches!(self, TransactionKind::WriteOff | TransactionKind::Release)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable entry in the append-only transaction log. Records are the
/// authoritative event history; the account row is a derived materialization.
/// Corrections are made by appending, never by editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Monotonic id, assigned by the log on insert.
    pub id: RecordId,
    pub kind: TransactionKind,
    pub user_id: UserId,
    /// Absent for top-ups.
    pub order_id: Option<OrderId>,
    /// Absent for top-ups.
    pub service_id: Option<ServiceId>,
    /// Always positive.
    pub amount: Amount,
    /// Assigned at commit time, UTC.
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Returns true if this record belongs to the given reservation key.
    pub fn matches_order(&self, order_id: OrderId, service_id: ServiceId) -> bool {
        self.order_id == Some(order_id) && self.service_id == Some(service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            TransactionKind::TopUp,
            TransactionKind::Reserve,
            TransactionKind::WriteOff,
            TransactionKind::Release,
        ] {
            let parsed = TransactionKind::from_str(kind.as_str()).unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_kind_from_unknown_string() {
        assert_eq!(TransactionKind::from_str("refund"), None);
        assert_eq!(TransactionKind::from_str("write-off"), None);
    }

    #[test]
    fn test_settling_kinds() {
        assert!(TransactionKind::WriteOff.settles());
        assert!(TransactionKind::Release.settles());
        assert!(!TransactionKind::Reserve.settles());
        assert!(!TransactionKind::TopUp.settles());
    }
}
