use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    Basic,
    Premium,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Basic => "BASIC",
            PlanType::Premium => "PREMIUM",
        }
    }

    pub fn plan_name(&self) -> &'static str {
        match self {
            PlanType::Basic => "Basic",
            PlanType::Premium => "Premium",
        }
    }

    /// Questions a subscriber may ask per billing period.
    pub fn question_quota(&self) -> i32 {
        match self {
            PlanType::Basic => 5,
            PlanType::Premium => 100,
        }
    }
}

impl FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BASIC" => Ok(PlanType::Basic),
            "PREMIUM" => Ok(PlanType::Premium),
            other => Err(format!("Invalid plan type: {}", other)),
        }
    }
}

impl Display for PlanType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a subscription sits in its lifecycle.
///
/// Derived from `is_active` and `billing_key` rather than stored: a cancelled
/// subscription keeps its active flag until the next due run finds the key gone.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionState {
    Inactive,
    Active,
    /// Cancelled, but paid through the current period.
    PendingLapse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub customer_key: String,
    #[serde(skip_serializing)]
    pub billing_key: Option<String>,
    pub plan_name: String,
    pub plan_type: PlanType,
    pub price: i64,
    pub question_quota: i32,
    pub is_active: bool,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub next_billing_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn state(&self) -> SubscriptionState {
        let has_billing_key = self
            .billing_key
            .as_deref()
            .map_or(false, |key| !key.trim().is_empty());

        match (self.is_active, has_billing_key) {
            (false, _) => SubscriptionState::Inactive,
            (true, true) => SubscriptionState::Active,
            (true, false) => SubscriptionState::PendingLapse,
        }
    }

    /// Due on `date` itself, or overdue because an earlier run failed or never happened.
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.is_active && self.next_billing_date.map_or(false, |due| due <= date)
    }

    pub(crate) fn apply_plan(&mut self, plan_type: PlanType, price: i64) {
        self.plan_type = plan_type;
        self.plan_name = plan_type.plan_name().to_string();
        self.question_quota = plan_type.question_quota();
        self.price = price;
    }
}

/// Insert shape used at signup: an inactive Basic record with no billing key.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: i64,
    pub customer_key: String,
    pub plan_type: PlanType,
    pub price: i64,
    pub start_date: NaiveDate,
}

impl NewSubscription {
    pub fn basic(user_id: i64, customer_key: &str, start_date: NaiveDate) -> Self {
        Self {
            user_id,
            customer_key: customer_key.to_string(),
            plan_type: PlanType::Basic,
            price: 0,
            start_date,
        }
    }
}

/// The billing date that follows a charge made on `run_date`.
///
/// Month-end dates clamp, so 2025-01-31 becomes 2025-02-28.
pub fn one_month_after(run_date: NaiveDate) -> Option<NaiveDate> {
    run_date.checked_add_months(Months::new(1))
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub state: SubscriptionState,
    #[serde(flatten)]
    pub subscription: Subscription,
}

impl From<Subscription> for SubscriptionView {
    fn from(subscription: Subscription) -> Self {
        Self {
            state: subscription.state(),
            subscription,
        }
    }
}
