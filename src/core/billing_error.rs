use thiserror::Error;

/// Everything that can go wrong while activating, cancelling or charging a subscription.
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("authorization key is blank")]
    InvalidAuthKey,

    #[error("customer key is blank")]
    InvalidCustomerKey,

    #[error("billing key is missing")]
    BillingKeyMissing,

    #[error("next billing date must move forward: {0}")]
    InvalidBillingDate(String),

    #[error("subscription not found")]
    SubscriptionNotFound,

    #[error("subscription is already active")]
    SubscriptionAlreadyActive,

    #[error("a subscription already exists for this customer key")]
    SubscriptionAlreadyExists,

    #[error("subscription is inactive")]
    SubscriptionInactive,

    #[error("billing customer not found")]
    CustomerNotFound,

    #[error("payment gateway error: {0}")]
    PaymentGatewayError(String),

    #[error("payment gateway did not return a billing key")]
    BillingKeyNotFound,

    #[error("database error: {0}")]
    Database(String),
}

impl BillingError {
    /// The failure originated at the payment gateway rather than locally.
    pub fn is_gateway_error(&self) -> bool {
        matches!(
            self,
            Self::PaymentGatewayError(_) | Self::BillingKeyNotFound
        )
    }

    /// The requested transition is illegal for the subscription's current state.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionNotFound
                | Self::SubscriptionAlreadyActive
                | Self::SubscriptionAlreadyExists
                | Self::SubscriptionInactive
                | Self::CustomerNotFound
        )
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(error: sqlx::Error) -> Self {
        BillingError::Database(error.to_string())
    }
}

impl From<reqwest::Error> for BillingError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return BillingError::PaymentGatewayError(format!("request timed out: {}", error));
        }
        BillingError::PaymentGatewayError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::BillingError;

    #[test]
    fn gateway_and_state_errors_are_disjoint() {
        let gateway = BillingError::PaymentGatewayError("502".into());
        assert!(gateway.is_gateway_error());
        assert!(!gateway.is_state_error());

        let state = BillingError::SubscriptionInactive;
        assert!(state.is_state_error());
        assert!(!state.is_gateway_error());

        assert!(!BillingError::BillingKeyMissing.is_state_error());
    }
}
