pub mod billing;
mod locks;
pub mod subscriptions;

pub use billing::BillingService;
pub use locks::ChargeLocks;
pub use subscriptions::SubscriptionService;
