use chrono::NaiveTime;
use chrono_tz::Tz;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use sqlx::postgres::PgConnectOptions;
use sqlx::ConnectOptions;

#[derive(Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub gateway: GatewayConfig,
    pub scheduler: SchedulerConfig,
    pub billing: BillingConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self, config::ConfigError> {
        let base_path = std::env::current_dir()
            .map_err(|e| config::ConfigError::Message(format!("no current dir: {}", e)))?;
        let config_dir = base_path.join("src/core/configurations");

        let app_environment: Environment = std::env::var("BILLING_APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .try_into()
            .map_err(config::ConfigError::Message)?;

        let configurations = config::Config::builder()
            .add_source(
                config::File::from(config_dir.join(app_environment.as_str())).required(true),
            )
            // e.g. APP_GATEWAY__SECRET_KEY=live_sk_... overrides gateway.secret_key
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        configurations.try_deserialize()
    }
}

#[derive(Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct PostgresConfig {
    pub username: String,
    pub password: Secret<String>,
    pub host: String,
    pub port: u16,
    pub database_name: String,
}

impl PostgresConfig {
    pub fn connect(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .database(&self.database_name);

        options.log_statements(tracing::log::LevelFilter::Trace)
    }
}

#[derive(Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
    pub timeout_milliseconds: u64,
}

impl GatewayConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

/// When the daily billing run fires. `run_at` is a local wall-clock time in `time_zone`.
#[derive(Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub time_zone: String,
    pub run_at: String,
}

impl SchedulerConfig {
    pub fn time_zone(&self) -> Result<Tz, String> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| format!("invalid scheduler time zone {}: {}", self.time_zone, e))
    }

    pub fn run_at(&self) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(&self.run_at, "%H:%M")
            .map_err(|e| format!("invalid scheduler run_at {}: {}", self.run_at, e))
    }
}

#[derive(Deserialize, Clone)]
pub struct BillingConfig {
    /// Monthly price of the premium plan, in whole currency units.
    pub premium_price: i64,
}

pub enum Environment {
    Local,
    Sandbox,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not supported environment. Use either `local`, `sandbox` or `production` ",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(time_zone: &str, run_at: &str) -> SchedulerConfig {
        SchedulerConfig {
            enabled: true,
            time_zone: time_zone.to_string(),
            run_at: run_at.to_string(),
        }
    }

    #[test]
    fn scheduler_parses_zone_and_time() {
        let config = scheduler("Asia/Seoul", "00:00");
        assert_eq!(config.time_zone().unwrap(), chrono_tz::Asia::Seoul);
        assert_eq!(
            config.run_at().unwrap(),
            NaiveTime::from_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn scheduler_rejects_garbage() {
        assert!(scheduler("Mars/Olympus", "00:00").time_zone().is_err());
        assert!(scheduler("UTC", "25:99").run_at().is_err());
    }

    #[test]
    fn environment_is_case_insensitive() {
        let env: Environment = "Production".to_string().try_into().unwrap();
        assert_eq!(env.as_str(), "production");
        assert!(Environment::try_from("staging".to_string()).is_err());
    }
}
