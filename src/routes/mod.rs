use actix_web::web::{scope, ServiceConfig};
use actix_web::Scope;
use billing::trigger_billing_run;
use health::health_check;
use subscriptions::{get_subscription, get_subscription_payments};

mod billing;
mod health;
mod subscriptions;

fn billing_routes() -> Scope {
    scope("billing").service(trigger_billing_run)
}

fn subscriptions_routes() -> Scope {
    scope("subscriptions")
        .service(get_subscription_payments)
        .service(get_subscription)
}

pub fn recurring_billing_routes(conf: &mut ServiceConfig) {
    conf.service(health_check).service(
        scope("api/v1")
            .service(billing_routes())
            .service(subscriptions_routes()),
    );
}
