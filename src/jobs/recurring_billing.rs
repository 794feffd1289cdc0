use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::core::BillingError;
use crate::models::subscriptions::{Subscription, SubscriptionState};
use crate::services::{BillingService, SubscriptionService};

/// What one daily run did. Failed items stay due and are picked up again tomorrow.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BillingRunReport {
    pub run_date: Option<NaiveDate>,
    pub due: usize,
    pub charged: usize,
    pub lapsed: usize,
    pub failed: usize,
}

impl BillingRunReport {
    fn record_failure(&mut self, subscription: &Subscription, e: &BillingError) {
        self.failed += 1;
        if e.is_state_error() {
            warn!(
                subscription_id = subscription.id,
                customer_key = %subscription.customer_key,
                error.message = %e,
                "Skipped subscription"
            );
            return;
        }
        error!(
            subscription_id = subscription.id,
            customer_key = %subscription.customer_key,
            error.cause_chain = ?e,
            error.message = %e,
            "Failed to bill subscription"
        );
    }
}

#[derive(Clone)]
pub struct RecurringBillingJob {
    subscriptions: SubscriptionService,
    billing: BillingService,
    time_zone: Tz,
}

impl RecurringBillingJob {
    pub fn new(billing: BillingService, time_zone: Tz) -> Self {
        Self {
            subscriptions: billing.subscriptions().clone(),
            billing,
            time_zone,
        }
    }

    pub fn subscriptions(&self) -> &SubscriptionService {
        &self.subscriptions
    }

    /// The calendar date right now in the billing time zone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.time_zone).date_naive()
    }

    pub async fn run_for_today(&self) -> Result<BillingRunReport, BillingError> {
        self.run(self.today()).await
    }

    /// Bill every subscription due on `today`, one at a time.
    ///
    /// A subscription without a billing key is lapsed instead of charged. Errors on one
    /// subscription are logged and counted; they never stop the rest of the batch.
    #[instrument(name = "Recurring billing run", skip(self))]
    pub async fn run(&self, today: NaiveDate) -> Result<BillingRunReport, BillingError> {
        let due = self.subscriptions.list_due_for_billing(today).await?;

        let mut report = BillingRunReport {
            run_date: Some(today),
            due: due.len(),
            ..BillingRunReport::default()
        };
        info!(due = report.due, "Starting recurring billing run");

        for subscription in &due {
            match subscription.state() {
                SubscriptionState::PendingLapse => {
                    match self.subscriptions.deactivate(subscription, today).await {
                        Ok(_) => report.lapsed += 1,
                        Err(e) => report.record_failure(subscription, &e),
                    }
                }
                _ => match self.billing.charge_subscription(subscription, today).await {
                    Ok(_) => report.charged += 1,
                    Err(e) => report.record_failure(subscription, &e),
                },
            }
        }

        info!(
            charged = report.charged,
            lapsed = report.lapsed,
            failed = report.failed,
            "Finished recurring billing run"
        );
        Ok(report)
    }
}

/// Spawn the daily billing loop: sleep until the next `run_at` in the job's time zone,
/// run, repeat.
pub fn start_recurring_billing_job(job: RecurringBillingJob, run_at: NaiveTime) -> JoinHandle<()> {
    info!(time_zone = %job.time_zone, %run_at, "Starting recurring billing background job");

    tokio::spawn(async move {
        loop {
            let now = Utc::now().with_timezone(&job.time_zone);
            let next = next_run_at(now, run_at);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, "Recurring billing run scheduled");

            tokio::time::sleep(wait).await;

            // "today" is pinned once here and used for the whole batch.
            let today = next.date_naive();
            if let Err(e) = job.run(today).await {
                error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Recurring billing run failed"
                );
            }
        }
    })
}

/// The first instant strictly after `now` whose local time is `run_at`.
///
/// A `run_at` that falls in a DST gap fires at the first wall-clock minute after it that exists.
pub fn next_run_at(now: DateTime<Tz>, run_at: NaiveTime) -> DateTime<Tz> {
    let time_zone = now.timezone();
    let mut date = now.date_naive();

    loop {
        if let Some(candidate) = resolve_local(&time_zone, date, run_at) {
            if candidate > now {
                return candidate;
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => {
                warn!("Ran out of calendar while scheduling billing run");
                return now + Duration::days(1);
            }
        };
    }
}

const MAX_GAP_MINUTES: i64 = 180;

fn resolve_local(time_zone: &Tz, date: NaiveDate, run_at: NaiveTime) -> Option<DateTime<Tz>> {
    let local = date.and_time(run_at);
    (0..=MAX_GAP_MINUTES)
        .map(|minutes| local + Duration::minutes(minutes))
        .find_map(|shifted| time_zone.from_local_datetime(&shifted).earliest())
}
