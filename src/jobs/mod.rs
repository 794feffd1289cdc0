pub mod recurring_billing;

pub use recurring_billing::{start_recurring_billing_job, BillingRunReport, RecurringBillingJob};
