use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Outcome of a charge as reported by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Ready,
    InProgress,
    Done,
    Canceled,
    PartialCanceled,
    Aborted,
    Expired,
    Failed,
    /// A status this engine does not know yet, kept verbatim.
    Other(String),
}

impl PaymentStatus {
    pub fn from_gateway(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "READY" => PaymentStatus::Ready,
            "IN_PROGRESS" => PaymentStatus::InProgress,
            "DONE" => PaymentStatus::Done,
            "CANCELED" | "CANCELLED" => PaymentStatus::Canceled,
            "PARTIAL_CANCELED" => PaymentStatus::PartialCanceled,
            "ABORTED" => PaymentStatus::Aborted,
            "EXPIRED" => PaymentStatus::Expired,
            "FAILED" => PaymentStatus::Failed,
            _ => PaymentStatus::Other(status.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Ready => "READY",
            PaymentStatus::InProgress => "IN_PROGRESS",
            PaymentStatus::Done => "DONE",
            PaymentStatus::Canceled => "CANCELED",
            PaymentStatus::PartialCanceled => "PARTIAL_CANCELED",
            PaymentStatus::Aborted => "ABORTED",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Other(status) => status,
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry. Written once per resolved charge and never edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub subscription_id: Option<i64>,
    pub user_id: i64,
    pub order_id: String,
    pub payment_key: String,
    pub order_name: String,
    pub total_amount: i64,
    pub method: Option<String>,
    pub status: PaymentStatus,
    pub approved_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub subscription_id: Option<i64>,
    pub user_id: i64,
    pub order_id: String,
    pub payment_key: String,
    pub order_name: String,
    pub total_amount: i64,
    pub method: Option<String>,
    pub status: PaymentStatus,
    pub approved_at: DateTime<Utc>,
}
