use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::subscriptions::ensure_moves_forward;
use super::{ChargeLocks, SubscriptionService};
use crate::core::BillingError;
use crate::db::BillingRepository;
use crate::gateway::{ChargeRequest, ChargeResponse, PaymentGateway};
use crate::models::payments::{NewPayment, Payment, PaymentStatus};
use crate::models::subscriptions::{one_month_after, Subscription, SubscriptionState};

/// Runs single charge attempts against the gateway and records their outcome.
#[derive(Clone)]
pub struct BillingService {
    subscriptions: SubscriptionService,
    repository: Arc<dyn BillingRepository>,
    gateway: Arc<dyn PaymentGateway>,
    locks: ChargeLocks,
}

impl BillingService {
    pub fn new(
        subscriptions: SubscriptionService,
        repository: Arc<dyn BillingRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            locks: subscriptions.locks().clone(),
            subscriptions,
            repository,
            gateway,
        }
    }

    pub fn subscriptions(&self) -> &SubscriptionService {
        &self.subscriptions
    }

    /// Charge one billing period and move the next billing date to a month after `run_date`.
    ///
    /// Nothing is written unless the gateway reports the charge `DONE`; the ledger entry and
    /// the date move are committed together.
    #[instrument(
        name = "Charge subscription",
        skip(self, subscription),
        fields(subscription_id = subscription.id, order_id = tracing::field::Empty)
    )]
    pub async fn charge_subscription(
        &self,
        subscription: &Subscription,
        run_date: NaiveDate,
    ) -> Result<Payment, BillingError> {
        let _guard = self.locks.acquire(subscription.id).await;

        // The caller's copy may be stale; only the stored row decides.
        let subscription = self.subscriptions.get_by_id(subscription.id).await?;
        let billing_key = match subscription.state() {
            SubscriptionState::Inactive => return Err(BillingError::SubscriptionInactive),
            SubscriptionState::PendingLapse => return Err(BillingError::BillingKeyMissing),
            SubscriptionState::Active => subscription
                .billing_key
                .clone()
                .ok_or(BillingError::BillingKeyMissing)?,
        };

        let next_billing_date = one_month_after(run_date).ok_or_else(|| {
            BillingError::InvalidBillingDate(format!("no date one month after {}", run_date))
        })?;
        ensure_moves_forward(&subscription, next_billing_date)?;

        let customer = self
            .repository
            .find_customer(subscription.user_id)
            .await?
            .ok_or(BillingError::CustomerNotFound)?;

        let order_id = Uuid::new_v4().simple().to_string();
        tracing::Span::current().record("order_id", order_id.as_str());

        let request = ChargeRequest {
            billing_key,
            customer_key: subscription.customer_key.clone(),
            amount: subscription.price,
            order_id,
            order_name: format!("{} subscription", subscription.plan_name),
            customer_email: customer.email,
            customer_name: customer.name,
            idempotency_key: idempotency_key(&subscription, run_date),
        };

        let response = self.gateway.charge(&request).await?;
        let payment = new_payment(&subscription, &request, response)?;
        if payment.status != PaymentStatus::Done {
            warn!(status = %payment.status, "Gateway did not complete the charge");
            return Err(BillingError::PaymentGatewayError(format!(
                "charge {} ended with status {}",
                payment.order_id, payment.status
            )));
        }

        let payment = self
            .repository
            .record_charge(payment, subscription.id, next_billing_date)
            .await?;

        info!(
            payment_id = payment.id,
            amount = payment.total_amount,
            %next_billing_date,
            "Subscription charged"
        );
        Ok(payment)
    }

    /// First activation: exchange the authorization for a billing key, activate, and take
    /// the first payment immediately. A failed first charge leaves the record as it was.
    #[instrument(name = "Register payment method", skip(self, auth_key))]
    pub async fn register_payment_method(
        &self,
        customer_key: &str,
        auth_key: &str,
        run_date: NaiveDate,
    ) -> Result<Payment, BillingError> {
        let billing_key = self.gateway.issue_billing_key(auth_key, customer_key).await?;
        let previous = self.subscriptions.get_by_customer_key(customer_key).await?;
        let subscription = self
            .subscriptions
            .activate(customer_key, &billing_key, run_date)
            .await?;

        match self.charge_subscription(&subscription, run_date).await {
            Ok(payment) => Ok(payment),
            Err(error) => {
                // An unpaid activation would never come due, so put the record back.
                warn!(error.message = %error, "First charge failed, reverting activation");
                if let Err(restore_error) = self.revert_activation(&subscription, &previous).await {
                    tracing::error!(
                        error.cause_chain = ?restore_error,
                        error.message = %restore_error,
                        "Failed to revert activation"
                    );
                }
                Err(error)
            }
        }
    }

    /// Put `previous` back unless something charged the subscription since `activated`.
    async fn revert_activation(
        &self,
        activated: &Subscription,
        previous: &Subscription,
    ) -> Result<(), BillingError> {
        let _guard = self.locks.acquire(activated.id).await;

        let current = self.subscriptions.get_by_id(activated.id).await?;
        if current.next_billing_date != activated.next_billing_date {
            info!("Subscription was charged after activation, keeping it active");
            return Ok(());
        }

        self.repository.update_subscription(previous).await?;
        Ok(())
    }
}

/// `{customer_key}-{period}` where the period is the due date being paid for. A charge
/// retried on a later day for the same unadvanced period therefore reuses the key.
fn idempotency_key(subscription: &Subscription, run_date: NaiveDate) -> String {
    let period = match subscription.next_billing_date {
        Some(due) if due <= run_date => due,
        _ => run_date,
    };
    format!("{}-{}", subscription.customer_key, period.format("%Y%m%d"))
}

fn new_payment(
    subscription: &Subscription,
    request: &ChargeRequest,
    response: ChargeResponse,
) -> Result<NewPayment, BillingError> {
    let approved_at = DateTime::parse_from_rfc3339(&response.approved_at)
        .map_err(|e| {
            BillingError::PaymentGatewayError(format!(
                "unparseable approvedAt {:?}: {}",
                response.approved_at, e
            ))
        })?
        .with_timezone(&Utc);

    let order_id = if response.order_id.is_empty() {
        request.order_id.clone()
    } else {
        response.order_id
    };

    Ok(NewPayment {
        subscription_id: Some(subscription.id),
        user_id: subscription.user_id,
        order_id,
        payment_key: response.payment_key,
        order_name: response.order_name,
        total_amount: response.total_amount,
        method: response.method,
        status: PaymentStatus::from_gateway(&response.status),
        approved_at,
    })
}
