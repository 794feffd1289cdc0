//! Outbound client for the external payment provider.

mod http;

pub use http::HttpPaymentGateway;

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::BillingError;

/// Everything the gateway needs to charge a stored billing key once.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub billing_key: String,
    pub customer_key: String,
    pub amount: i64,
    pub order_id: String,
    pub order_name: String,
    pub customer_email: String,
    pub customer_name: String,
    /// Stable per billing period, so a retried period is deduplicated by the gateway.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChargeResponse {
    pub order_id: String,
    pub payment_key: String,
    pub order_name: String,
    pub status: String,
    #[serde(default)]
    pub method: Option<String>,
    pub total_amount: i64,
    /// RFC 3339 with offset, e.g. `2025-01-01T09:05:00+09:00`.
    pub approved_at: String,
}

/// Payment gateway abstraction.
///
/// Implementors provide the raw calls; the provided methods validate input first so
/// that blank keys never reach the network.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Exchange a one-time authorization for a reusable billing key.
    async fn request_billing_key(
        &self,
        auth_key: &str,
        customer_key: &str,
    ) -> Result<Option<String>, BillingError>;

    /// Charge the amount in `request` against its billing key.
    async fn request_charge(&self, request: &ChargeRequest)
        -> Result<ChargeResponse, BillingError>;

    async fn issue_billing_key(
        &self,
        auth_key: &str,
        customer_key: &str,
    ) -> Result<String, BillingError> {
        if auth_key.trim().is_empty() {
            return Err(BillingError::InvalidAuthKey);
        }
        if customer_key.trim().is_empty() {
            return Err(BillingError::InvalidCustomerKey);
        }

        match self.request_billing_key(auth_key, customer_key).await? {
            Some(billing_key) if !billing_key.trim().is_empty() => Ok(billing_key),
            _ => Err(BillingError::BillingKeyNotFound),
        }
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResponse, BillingError> {
        if request.billing_key.trim().is_empty() {
            return Err(BillingError::BillingKeyMissing);
        }
        if request.customer_key.trim().is_empty() {
            return Err(BillingError::InvalidCustomerKey);
        }

        self.request_charge(request).await
    }
}
