use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::{ChargeRequest, ChargeResponse, PaymentGateway};
use crate::core::config::GatewayConfig;
use crate::core::BillingError;

/// Toss-style billing API over HTTPS, authenticated with the secret key as basic-auth user.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    secret_key: Secret<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueBillingKeyBody<'a> {
    auth_key: &'a str,
    customer_key: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueBillingKeyResponse {
    #[serde(default)]
    billing_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChargeBody<'a> {
    customer_key: &'a str,
    amount: i64,
    order_id: &'a str,
    order_name: &'a str,
    customer_email: &'a str,
    customer_name: &'a str,
}

#[derive(Deserialize, Default)]
struct GatewayFailure {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, BillingError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(BillingError::from)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    async fn post<B, T>(
        &self,
        endpoint: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<T, BillingError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request = self
            .client
            .post(&url)
            .basic_auth(self.secret_key.expose_secret(), Option::<&str>::None)
            .json(body);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Payment gateway request failed");
            BillingError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let failure = response.json::<GatewayFailure>().await.unwrap_or_default();
            error!(
                status = %status,
                code = %failure.code,
                message = %failure.message,
                "Payment gateway rejected request"
            );
            return Err(rejection(status, failure));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse payment gateway response");
            BillingError::PaymentGatewayError(format!("malformed response body: {}", e))
        })
    }
}

fn rejection(status: StatusCode, failure: GatewayFailure) -> BillingError {
    if failure.code.is_empty() {
        return BillingError::PaymentGatewayError(format!("gateway returned {}", status));
    }
    BillingError::PaymentGatewayError(format!(
        "gateway returned {}: {} {}",
        status, failure.code, failure.message
    ))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(name = "Issue billing key", skip(self, auth_key))]
    async fn request_billing_key(
        &self,
        auth_key: &str,
        customer_key: &str,
    ) -> Result<Option<String>, BillingError> {
        let body = IssueBillingKeyBody {
            auth_key,
            customer_key,
        };

        let response: IssueBillingKeyResponse = self
            .post("/v1/billing/authorizations/issue", &body, None)
            .await?;

        Ok(response.billing_key)
    }

    #[instrument(
        name = "Charge billing key",
        skip(self, request),
        fields(order_id = %request.order_id, customer_key = %request.customer_key)
    )]
    async fn request_charge(
        &self,
        request: &ChargeRequest,
    ) -> Result<ChargeResponse, BillingError> {
        debug!(amount = request.amount, "Charging billing key");

        let body = ChargeBody {
            customer_key: &request.customer_key,
            amount: request.amount,
            order_id: &request.order_id,
            order_name: &request.order_name,
            customer_email: &request.customer_email,
            customer_name: &request.customer_name,
        };

        self.post(
            &format!("/v1/billing/{}", request.billing_key),
            &body,
            Some(&request.idempotency_key),
        )
        .await
    }
}
