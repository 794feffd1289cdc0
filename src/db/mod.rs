pub mod payments;
pub mod subscriptions;
pub mod users;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::core::BillingError;
use crate::models::payments::{NewPayment, Payment};
use crate::models::subscriptions::{NewSubscription, Subscription};
use crate::models::users::BillingCustomer;

/// Persistence boundary behind the subscription store and the payment ledger.
#[async_trait]
pub trait BillingRepository: Send + Sync {
    async fn find_subscription_by_id(&self, id: i64) -> Result<Option<Subscription>, BillingError>;

    async fn find_subscription_by_customer_key(
        &self,
        customer_key: &str,
    ) -> Result<Option<Subscription>, BillingError>;

    /// Fails with `SubscriptionAlreadyExists` when the customer key is taken.
    async fn insert_subscription(
        &self,
        subscription: NewSubscription,
    ) -> Result<Subscription, BillingError>;

    async fn update_subscription(
        &self,
        subscription: &Subscription,
    ) -> Result<Subscription, BillingError>;

    /// Drop the billing key of an active subscription and nothing else. `None` when the
    /// row is no longer active with a key.
    async fn clear_billing_key(
        &self,
        subscription_id: i64,
    ) -> Result<Option<Subscription>, BillingError>;

    /// Active subscriptions whose next billing date is `date` or earlier, in no particular order.
    async fn list_due_subscriptions(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Subscription>, BillingError>;

    async fn find_customer(&self, user_id: i64) -> Result<Option<BillingCustomer>, BillingError>;

    /// Append `payment` and move the subscription's next billing date in one transaction.
    async fn record_charge(
        &self,
        payment: NewPayment,
        subscription_id: i64,
        next_billing_date: NaiveDate,
    ) -> Result<Payment, BillingError>;

    async fn payments_for_subscription(
        &self,
        subscription_id: i64,
    ) -> Result<Vec<Payment>, BillingError>;
}

#[derive(Clone)]
pub struct PgBillingRepository {
    pool: PgPool,
}

impl PgBillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BillingRepository for PgBillingRepository {
    async fn find_subscription_by_id(&self, id: i64) -> Result<Option<Subscription>, BillingError> {
        subscriptions::get_subscription_by_id(&self.pool, id).await
    }

    async fn find_subscription_by_customer_key(
        &self,
        customer_key: &str,
    ) -> Result<Option<Subscription>, BillingError> {
        subscriptions::get_subscription_by_customer_key(&self.pool, customer_key).await
    }

    async fn insert_subscription(
        &self,
        subscription: NewSubscription,
    ) -> Result<Subscription, BillingError> {
        subscriptions::create_subscription(&self.pool, &subscription).await
    }

    async fn update_subscription(
        &self,
        subscription: &Subscription,
    ) -> Result<Subscription, BillingError> {
        subscriptions::update_subscription(&self.pool, subscription).await
    }

    async fn clear_billing_key(
        &self,
        subscription_id: i64,
    ) -> Result<Option<Subscription>, BillingError> {
        subscriptions::clear_billing_key(&self.pool, subscription_id).await
    }

    async fn list_due_subscriptions(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Subscription>, BillingError> {
        subscriptions::get_due_subscriptions(&self.pool, date).await
    }

    async fn find_customer(&self, user_id: i64) -> Result<Option<BillingCustomer>, BillingError> {
        users::get_billing_customer(&self.pool, user_id).await
    }

    async fn record_charge(
        &self,
        payment: NewPayment,
        subscription_id: i64,
        next_billing_date: NaiveDate,
    ) -> Result<Payment, BillingError> {
        let mut transaction = self.pool.begin().await?;

        subscriptions::lock_subscription(&mut transaction, subscription_id).await?;
        let payment = payments::insert_payment(&mut transaction, &payment).await?;
        subscriptions::set_next_billing_date(&mut transaction, subscription_id, next_billing_date)
            .await?;

        transaction.commit().await?;
        Ok(payment)
    }

    async fn payments_for_subscription(
        &self,
        subscription_id: i64,
    ) -> Result<Vec<Payment>, BillingError> {
        payments::get_payments_by_subscription(&self.pool, subscription_id).await
    }
}
