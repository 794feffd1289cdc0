use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument};

use super::ChargeLocks;
use crate::core::BillingError;
use crate::db::BillingRepository;
use crate::models::payments::Payment;
use crate::models::subscriptions::{
    NewSubscription, PlanType, Subscription, SubscriptionState,
};

/// Owns every state transition of a subscription record.
///
/// Transitions hold the same per-subscription lock as a charge, so a lifecycle write can
/// never interleave with a charge attempt on the same subscription.
#[derive(Clone)]
pub struct SubscriptionService {
    repository: Arc<dyn BillingRepository>,
    premium_price: i64,
    locks: ChargeLocks,
}

impl SubscriptionService {
    pub fn new(repository: Arc<dyn BillingRepository>, premium_price: i64) -> Self {
        Self {
            repository,
            premium_price,
            locks: ChargeLocks::new(),
        }
    }

    pub(crate) fn locks(&self) -> &ChargeLocks {
        &self.locks
    }

    /// Signup path: the inactive Basic record every user starts with.
    #[instrument(name = "Create subscription", skip(self))]
    pub async fn create_for_user(
        &self,
        user_id: i64,
        customer_key: &str,
        created_on: NaiveDate,
    ) -> Result<Subscription, BillingError> {
        if customer_key.trim().is_empty() {
            return Err(BillingError::InvalidCustomerKey);
        }
        if self
            .repository
            .find_subscription_by_customer_key(customer_key)
            .await?
            .is_some()
        {
            return Err(BillingError::SubscriptionAlreadyExists);
        }

        self.repository
            .insert_subscription(NewSubscription::basic(user_id, customer_key, created_on))
            .await
    }

    pub async fn get_by_customer_key(&self, customer_key: &str) -> Result<Subscription, BillingError> {
        self.repository
            .find_subscription_by_customer_key(customer_key)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)
    }

    pub async fn get_by_id(&self, subscription_id: i64) -> Result<Subscription, BillingError> {
        self.repository
            .find_subscription_by_id(subscription_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)
    }

    /// Store the billing key and switch to the premium plan. Charging is the caller's job.
    #[instrument(name = "Activate subscription", skip(self, billing_key))]
    pub async fn activate(
        &self,
        customer_key: &str,
        billing_key: &str,
        activated_on: NaiveDate,
    ) -> Result<Subscription, BillingError> {
        if billing_key.trim().is_empty() {
            return Err(BillingError::BillingKeyMissing);
        }

        let found = self.get_by_customer_key(customer_key).await?;
        let _guard = self.locks.acquire(found.id).await;

        let mut subscription = self.get_by_id(found.id).await?;
        if subscription.state() != SubscriptionState::Inactive {
            return Err(BillingError::SubscriptionAlreadyActive);
        }

        subscription.is_active = true;
        subscription.billing_key = Some(billing_key.to_string());
        subscription.apply_plan(PlanType::Premium, self.premium_price);
        subscription.start_date = activated_on;
        subscription.end_date = None;

        let subscription = self.repository.update_subscription(&subscription).await?;
        info!(subscription_id = subscription.id, "Subscription activated");
        Ok(subscription)
    }

    /// Soft cancel: drop the billing key and leave the paid period running.
    #[instrument(name = "Cancel subscription", skip(self))]
    pub async fn cancel(&self, customer_key: &str) -> Result<Subscription, BillingError> {
        let found = self.get_by_customer_key(customer_key).await?;
        let _guard = self.locks.acquire(found.id).await;

        let subscription = self
            .repository
            .clear_billing_key(found.id)
            .await?
            .ok_or(BillingError::SubscriptionInactive)?;
        info!(
            subscription_id = subscription.id,
            next_billing_date = ?subscription.next_billing_date,
            "Subscription will lapse at the next billing date"
        );
        Ok(subscription)
    }

    pub async fn advance_next_billing_date(
        &self,
        subscription: &Subscription,
        new_date: NaiveDate,
    ) -> Result<Subscription, BillingError> {
        let _guard = self.locks.acquire(subscription.id).await;

        let mut subscription = self.get_by_id(subscription.id).await?;
        ensure_moves_forward(&subscription, new_date)?;

        subscription.next_billing_date = Some(new_date);
        self.repository.update_subscription(&subscription).await
    }

    /// Ledger entries for the customer's subscription, newest first.
    pub async fn payment_history(&self, customer_key: &str) -> Result<Vec<Payment>, BillingError> {
        let subscription = self.get_by_customer_key(customer_key).await?;
        self.repository
            .payments_for_subscription(subscription.id)
            .await
    }

    pub async fn list_due_for_billing(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Subscription>, BillingError> {
        self.repository.list_due_subscriptions(date).await
    }

    /// Complete a soft cancellation once its paid period has run out.
    #[instrument(name = "Deactivate subscription", skip(self, subscription), fields(subscription_id = subscription.id))]
    pub async fn deactivate(
        &self,
        subscription: &Subscription,
        lapsed_on: NaiveDate,
    ) -> Result<Subscription, BillingError> {
        let _guard = self.locks.acquire(subscription.id).await;

        let mut subscription = self.get_by_id(subscription.id).await?;
        match subscription.state() {
            SubscriptionState::PendingLapse => {}
            SubscriptionState::Inactive => return Ok(subscription),
            SubscriptionState::Active => {
                info!("Billing key present again, leaving subscription active");
                return Ok(subscription);
            }
        }

        subscription.is_active = false;
        subscription.billing_key = None;
        subscription.apply_plan(PlanType::Basic, 0);
        subscription.end_date = Some(lapsed_on);
        subscription.next_billing_date = None;

        let subscription = self.repository.update_subscription(&subscription).await?;
        info!("Subscription lapsed");
        Ok(subscription)
    }
}

/// Billing dates only ever move forward.
pub(crate) fn ensure_moves_forward(
    subscription: &Subscription,
    new_date: NaiveDate,
) -> Result<(), BillingError> {
    match subscription.next_billing_date {
        Some(current) if new_date <= current => Err(BillingError::InvalidBillingDate(format!(
            "{} is not after {}",
            new_date, current
        ))),
        _ => Ok(()),
    }
}
