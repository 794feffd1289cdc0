//! Shared fixtures for the billing integration tests.

#![allow(dead_code)]

pub mod mock_gateway;
pub mod mock_repos;

use chrono::NaiveDate;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use once_cell::sync::Lazy;
use std::sync::Arc;

use recurring_billing::core::{get_subscriber, init_subscriber};
use recurring_billing::jobs::RecurringBillingJob;
use recurring_billing::models::subscriptions::{PlanType, Subscription};
use recurring_billing::models::users::BillingCustomer;
use recurring_billing::services::{BillingService, SubscriptionService};

pub use mock_gateway::ScriptedGateway;
pub use mock_repos::InMemoryBillingRepository;

pub const PREMIUM_PRICE: i64 = 9900;

// Logs are swallowed unless TEST_LOG is set.
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestBilling {
    pub repository: Arc<InMemoryBillingRepository>,
    pub gateway: Arc<ScriptedGateway>,
    pub subscriptions: SubscriptionService,
    pub billing: BillingService,
    pub job: RecurringBillingJob,
}

impl TestBilling {
    pub fn new() -> Self {
        Lazy::force(&TRACING);

        let repository = Arc::new(InMemoryBillingRepository::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let subscriptions = SubscriptionService::new(repository.clone(), PREMIUM_PRICE);
        let billing = BillingService::new(subscriptions.clone(), repository.clone(), gateway.clone());
        let job = RecurringBillingJob::new(billing.clone(), chrono_tz::Asia::Seoul);

        Self {
            repository,
            gateway,
            subscriptions,
            billing,
            job,
        }
    }

    /// A user plus their subscription row, stored as given.
    pub fn seed(&self, seed: SeedSubscription) -> Subscription {
        let user_id = self.repository.next_id();
        self.repository.insert_customer(BillingCustomer {
            id: user_id,
            email: SafeEmail().fake(),
            name: Name().fake(),
        });

        let subscription = Subscription {
            id: self.repository.next_id(),
            user_id,
            customer_key: seed.customer_key.to_string(),
            billing_key: seed.billing_key.map(str::to_string),
            plan_name: seed.plan_type.plan_name().to_string(),
            plan_type: seed.plan_type,
            price: seed.price,
            question_quota: seed.plan_type.question_quota(),
            is_active: seed.is_active,
            start_date: date(2024, 12, 1),
            end_date: None,
            next_billing_date: seed.next_billing_date,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.repository.insert_raw(subscription.clone());
        subscription
    }

    pub fn stored(&self, subscription_id: i64) -> Subscription {
        self.repository
            .subscription(subscription_id)
            .expect("subscription should exist")
    }
}

pub struct SeedSubscription {
    pub customer_key: &'static str,
    pub billing_key: Option<&'static str>,
    pub is_active: bool,
    pub plan_type: PlanType,
    pub price: i64,
    pub next_billing_date: Option<NaiveDate>,
}

impl SeedSubscription {
    pub fn active(customer_key: &'static str, billing_key: &'static str, due: NaiveDate) -> Self {
        Self {
            customer_key,
            billing_key: Some(billing_key),
            is_active: true,
            plan_type: PlanType::Premium,
            price: PREMIUM_PRICE,
            next_billing_date: Some(due),
        }
    }

    pub fn pending_lapse(customer_key: &'static str, due: NaiveDate) -> Self {
        Self {
            billing_key: None,
            ..Self::active(customer_key, "unused", due)
        }
    }

    pub fn inactive(customer_key: &'static str) -> Self {
        Self {
            customer_key,
            billing_key: None,
            is_active: false,
            plan_type: PlanType::Basic,
            price: 0,
            next_billing_date: None,
        }
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}
