use serde::{Deserialize, Serialize};

/// The slice of a user the billing engine needs for receipts on gateway calls.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq, Eq)]
pub struct BillingCustomer {
    pub id: i64,
    pub email: String,
    pub name: String,
}
