//! In-memory billing repository for testing

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use recurring_billing::core::BillingError;
use recurring_billing::db::BillingRepository;
use recurring_billing::models::payments::{NewPayment, Payment};
use recurring_billing::models::subscriptions::{NewSubscription, Subscription};
use recurring_billing::models::users::BillingCustomer;

#[derive(Default, Clone)]
pub struct InMemoryBillingRepository {
    ids: Arc<AtomicI64>,
    subscriptions: Arc<DashMap<i64, Subscription>>,
    customers: Arc<DashMap<i64, BillingCustomer>>,
    payments: Arc<Mutex<Vec<Payment>>>,
    fail_record_charge: Arc<AtomicBool>,
    cancel_gate: Arc<Mutex<Option<CancelGate>>>,
}

/// Parks billing-key clears until `release` is notified.
#[derive(Clone, Default)]
pub struct CancelGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl InMemoryBillingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> i64 {
        self.ids.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn insert_customer(&self, customer: BillingCustomer) {
        self.customers.insert(customer.id, customer);
    }

    /// Store a subscription exactly as given, bypassing the signup rules.
    pub fn insert_raw(&self, subscription: Subscription) {
        self.subscriptions.insert(subscription.id, subscription);
    }

    pub fn customer(&self, user_id: i64) -> Option<BillingCustomer> {
        self.customers.get(&user_id).map(|r| r.value().clone())
    }

    pub fn subscription(&self, id: i64) -> Option<Subscription> {
        self.subscriptions.get(&id).map(|r| r.value().clone())
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.payments.lock().unwrap().clone()
    }

    /// Hold every billing-key clear at the gate until the test releases it.
    pub fn gate_cancel(&self) -> CancelGate {
        let gate = CancelGate::default();
        *self.cancel_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Make the next ledger writes fail as if the database went away.
    pub fn fail_record_charge(&self, fail: bool) {
        self.fail_record_charge.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BillingRepository for InMemoryBillingRepository {
    async fn find_subscription_by_id(&self, id: i64) -> Result<Option<Subscription>, BillingError> {
        Ok(self.subscription(id))
    }

    async fn find_subscription_by_customer_key(
        &self,
        customer_key: &str,
    ) -> Result<Option<Subscription>, BillingError> {
        Ok(self
            .subscriptions
            .iter()
            .find(|r| r.value().customer_key == customer_key)
            .map(|r| r.value().clone()))
    }

    async fn insert_subscription(
        &self,
        subscription: NewSubscription,
    ) -> Result<Subscription, BillingError> {
        if self
            .find_subscription_by_customer_key(&subscription.customer_key)
            .await?
            .is_some()
        {
            return Err(BillingError::SubscriptionAlreadyExists);
        }

        let row = Subscription {
            id: self.next_id(),
            user_id: subscription.user_id,
            customer_key: subscription.customer_key,
            billing_key: None,
            plan_name: subscription.plan_type.plan_name().to_string(),
            plan_type: subscription.plan_type,
            price: subscription.price,
            question_quota: subscription.plan_type.question_quota(),
            is_active: false,
            start_date: subscription.start_date,
            end_date: None,
            next_billing_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.insert_raw(row.clone());
        Ok(row)
    }

    async fn update_subscription(
        &self,
        subscription: &Subscription,
    ) -> Result<Subscription, BillingError> {
        let mut stored = self
            .subscriptions
            .get_mut(&subscription.id)
            .ok_or(BillingError::SubscriptionNotFound)?;

        *stored = Subscription {
            updated_at: Utc::now(),
            ..subscription.clone()
        };
        Ok(stored.clone())
    }

    async fn clear_billing_key(
        &self,
        subscription_id: i64,
    ) -> Result<Option<Subscription>, BillingError> {
        let gate = self.cancel_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut stored = match self.subscriptions.get_mut(&subscription_id) {
            Some(stored) => stored,
            None => return Ok(None),
        };
        let clearable = stored.is_active
            && stored
                .billing_key
                .as_deref()
                .map_or(false, |key| !key.trim().is_empty());
        if !clearable {
            return Ok(None);
        }

        stored.billing_key = None;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn list_due_subscriptions(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Subscription>, BillingError> {
        Ok(self
            .subscriptions
            .iter()
            .filter(|r| r.value().is_due_on(date))
            .map(|r| r.value().clone())
            .collect())
    }

    async fn find_customer(&self, user_id: i64) -> Result<Option<BillingCustomer>, BillingError> {
        Ok(self.customer(user_id))
    }

    async fn record_charge(
        &self,
        payment: NewPayment,
        subscription_id: i64,
        next_billing_date: NaiveDate,
    ) -> Result<Payment, BillingError> {
        if self.fail_record_charge.load(Ordering::SeqCst) {
            return Err(BillingError::Database("connection reset".into()));
        }

        let mut stored = self
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(BillingError::SubscriptionNotFound)?;

        let payment = Payment {
            id: self.next_id(),
            subscription_id: payment.subscription_id,
            user_id: payment.user_id,
            order_id: payment.order_id,
            payment_key: payment.payment_key,
            order_name: payment.order_name,
            total_amount: payment.total_amount,
            method: payment.method,
            status: payment.status,
            approved_at: payment.approved_at,
            created_at: Utc::now(),
        };

        stored.next_billing_date = Some(next_billing_date);
        stored.updated_at = Utc::now();
        self.payments.lock().unwrap().push(payment.clone());
        Ok(payment)
    }

    async fn payments_for_subscription(
        &self,
        subscription_id: i64,
    ) -> Result<Vec<Payment>, BillingError> {
        Ok(self
            .payments()
            .into_iter()
            .rev()
            .filter(|p| p.subscription_id == Some(subscription_id))
            .collect())
    }
}
