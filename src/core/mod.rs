pub mod billing_error;
pub mod config;
mod responses;
mod telemetry;

pub use self::billing_error::BillingError;
pub use self::config::AppConfig;
pub use responses::*;
pub use telemetry::*;
