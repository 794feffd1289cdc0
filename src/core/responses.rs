use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt::{Display, Formatter};

use super::BillingError;

#[derive(Debug, PartialEq)]
pub enum AppErrorType {
    NotFoundError,
    DbError,
    PayloadValidationError,
    ConflictError,
    ApiError { code: String, message: String },
}

#[derive(Debug, PartialEq)]
pub struct AppError {
    pub error_type: AppErrorType,
    pub message: Option<String>,
    pub cause: Option<String>,
}

#[derive(Serialize)]
pub struct AppErrorResponse {
    pub success: bool,
    pub message: String,
}

impl AppError {
    pub fn message(&self) -> String {
        match self {
            AppError {
                message: Some(message),
                ..
            } => message.clone(),

            AppError {
                message: None,
                error_type: AppErrorType::NotFoundError,
                ..
            } => "The requested item was not found".to_string(),
            _ => "An unexpected error has occurred".to_string(),
        }
    }

    pub fn db_error(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            error_type: AppErrorType::DbError,
            message: None,
        }
    }
}

impl From<BillingError> for AppError {
    fn from(error: BillingError) -> Self {
        let message = Some(error.to_string());
        let error_type = match &error {
            BillingError::SubscriptionNotFound | BillingError::CustomerNotFound => {
                AppErrorType::NotFoundError
            }
            BillingError::InvalidAuthKey
            | BillingError::InvalidCustomerKey
            | BillingError::BillingKeyMissing
            | BillingError::InvalidBillingDate(_) => AppErrorType::PayloadValidationError,
            BillingError::SubscriptionAlreadyActive
            | BillingError::SubscriptionAlreadyExists
            | BillingError::SubscriptionInactive => AppErrorType::ConflictError,
            BillingError::PaymentGatewayError(detail) => AppErrorType::ApiError {
                code: "PAYMENT_GATEWAY_ERROR".to_string(),
                message: detail.clone(),
            },
            BillingError::BillingKeyNotFound => AppErrorType::ApiError {
                code: "BILLING_KEY_NOT_FOUND".to_string(),
                message: error.to_string(),
            },
            BillingError::Database(cause) => return AppError::db_error(cause),
        };

        AppError {
            cause: Some(format!("{:?}", error)),
            error_type,
            message,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.error_type {
            AppErrorType::DbError => StatusCode::INTERNAL_SERVER_ERROR,
            AppErrorType::NotFoundError => StatusCode::NOT_FOUND,
            AppErrorType::PayloadValidationError => StatusCode::BAD_REQUEST,
            AppErrorType::ConflictError => StatusCode::CONFLICT,
            AppErrorType::ApiError { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(AppErrorResponse {
            success: false,
            message: self.message(),
        })
    }
}

#[derive(Serialize)]
pub struct AppSuccessResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}
