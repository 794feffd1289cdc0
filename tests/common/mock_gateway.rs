//! Scripted payment gateway with call recording

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use recurring_billing::core::BillingError;
use recurring_billing::gateway::{ChargeRequest, ChargeResponse, PaymentGateway};

/// How the gateway answers a charge against a given billing key.
#[derive(Debug, Clone)]
pub enum ChargeOutcome {
    Approve { approved_at: String },
    /// A 2xx answer whose status is something other than `DONE`.
    Resolve { status: &'static str },
    Timeout,
    Malformed,
}

#[derive(Default, Clone)]
pub struct ScriptedGateway {
    outcomes: Arc<DashMap<String, ChargeOutcome>>,
    billing_keys: Arc<DashMap<String, String>>,
    charges: Arc<Mutex<Vec<ChargeRequest>>>,
    issue_calls: Arc<AtomicUsize>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_charge(&self, billing_key: &str, outcome: ChargeOutcome) {
        self.outcomes.insert(billing_key.to_string(), outcome);
    }

    /// Exchanging `auth_key` yields `billing_key`; unknown auth keys yield nothing.
    pub fn on_issue(&self, auth_key: &str, billing_key: &str) {
        self.billing_keys
            .insert(auth_key.to_string(), billing_key.to_string());
    }

    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().unwrap().clone()
    }

    pub fn charge_count(&self) -> usize {
        self.charges.lock().unwrap().len()
    }

    pub fn issue_count(&self) -> usize {
        self.issue_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn request_billing_key(
        &self,
        auth_key: &str,
        _customer_key: &str,
    ) -> Result<Option<String>, BillingError> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.billing_keys.get(auth_key).map(|r| r.value().clone()))
    }

    async fn request_charge(
        &self,
        request: &ChargeRequest,
    ) -> Result<ChargeResponse, BillingError> {
        self.charges.lock().unwrap().push(request.clone());

        let outcome = self
            .outcomes
            .get(&request.billing_key)
            .map(|r| r.value().clone())
            .unwrap_or(ChargeOutcome::Approve {
                approved_at: "2025-01-01T00:05:00Z".to_string(),
            });

        match outcome {
            ChargeOutcome::Approve { approved_at } => Ok(ChargeResponse {
                order_id: request.order_id.clone(),
                payment_key: format!("pay_{}", request.order_id),
                order_name: request.order_name.clone(),
                status: "DONE".to_string(),
                method: Some("CARD".to_string()),
                total_amount: request.amount,
                approved_at,
            }),
            ChargeOutcome::Resolve { status } => Ok(ChargeResponse {
                order_id: request.order_id.clone(),
                payment_key: format!("pay_{}", request.order_id),
                order_name: request.order_name.clone(),
                status: status.to_string(),
                method: Some("CARD".to_string()),
                total_amount: request.amount,
                approved_at: "2025-01-01T00:05:00Z".to_string(),
            }),
            ChargeOutcome::Timeout => Err(BillingError::PaymentGatewayError(
                "request timed out".to_string(),
            )),
            ChargeOutcome::Malformed => Ok(ChargeResponse {
                order_id: request.order_id.clone(),
                payment_key: String::new(),
                order_name: request.order_name.clone(),
                status: "DONE".to_string(),
                method: None,
                total_amount: request.amount,
                approved_at: "not-a-timestamp".to_string(),
            }),
        }
    }
}
