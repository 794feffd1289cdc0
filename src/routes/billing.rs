use crate::core::{AppError, AppSuccessResponse};
use crate::jobs::RecurringBillingJob;

use actix_web::{post, web, HttpResponse, Result};

/// Run today's billing batch now, e.g. to recover from a missed scheduled run.
#[tracing::instrument(name = "Trigger Billing Run", skip(job))]
#[post("/runs")]
pub async fn trigger_billing_run(
    job: web::Data<RecurringBillingJob>,
) -> Result<HttpResponse, AppError> {
    let report = job.run_for_today().await?;

    Ok(HttpResponse::Ok().json(AppSuccessResponse {
        success: true,
        data: report,
        message: "Billing run completed".to_string(),
    }))
}
