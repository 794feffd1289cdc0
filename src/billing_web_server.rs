use crate::core::AppConfig;
use crate::db::{BillingRepository, PgBillingRepository};
use crate::gateway::{HttpPaymentGateway, PaymentGateway};
use crate::jobs::{start_recurring_billing_job, RecurringBillingJob};
use crate::routes::recurring_billing_routes;
use crate::services::{BillingService, SubscriptionService};
use actix_web::{dev::Server, web::Data, App, HttpServer};
use anyhow::anyhow;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

pub struct BillingWebServer {
    port: u16,
    server: Server,
}

impl BillingWebServer {
    pub async fn build(configuration: AppConfig) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            configuration.server.host, configuration.server.port
        );

        let postgres_pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect_lazy_with(configuration.postgres.connect());

        let repository: Arc<dyn BillingRepository> =
            Arc::new(PgBillingRepository::new(postgres_pool));
        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(HttpPaymentGateway::new(&configuration.gateway)?);

        let time_zone = configuration.scheduler.time_zone().map_err(|e| anyhow!(e))?;
        let run_at = configuration.scheduler.run_at().map_err(|e| anyhow!(e))?;

        let subscriptions =
            SubscriptionService::new(repository.clone(), configuration.billing.premium_price);
        let billing = BillingService::new(subscriptions, repository, gateway);
        let job = RecurringBillingJob::new(billing, time_zone);

        if configuration.scheduler.enabled {
            start_recurring_billing_job(job.clone(), run_at);
        } else {
            tracing::warn!("Recurring billing scheduler is disabled");
        }

        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let server = run(listener, job)?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(listener: TcpListener, job: RecurringBillingJob) -> Result<Server, anyhow::Error> {
    let subscriptions = Data::new(job.subscriptions().clone());
    let job = Data::new(job);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .configure(recurring_billing_routes)
            .app_data(job.clone())
            .app_data(subscriptions.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
