use crate::core::{AppError, AppSuccessResponse};
use crate::models::subscriptions::SubscriptionView;
use crate::services::SubscriptionService;

use actix_web::{get, web, HttpResponse, Result};

#[tracing::instrument(name = "Get Subscription", skip(subscriptions))]
#[get("/{customer_key}")]
pub async fn get_subscription(
    subscriptions: web::Data<SubscriptionService>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let customer_key = path.into_inner();
    let subscription = subscriptions.get_by_customer_key(&customer_key).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        data: SubscriptionView::from(subscription),
        message: "Subscription retrieved successfully".to_string(),
    }))
}

#[tracing::instrument(name = "Get Subscription Payments", skip(subscriptions))]
#[get("/{customer_key}/payments")]
pub async fn get_subscription_payments(
    subscriptions: web::Data<SubscriptionService>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let customer_key = path.into_inner();
    let payments = subscriptions.payment_history(&customer_key).await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        data: payments,
        message: "Payments retrieved successfully".to_string(),
    }))
}
