pub mod payments;
pub mod subscriptions;
pub mod users;
