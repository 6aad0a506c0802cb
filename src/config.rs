use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub sms: SmsConfig,
    pub email: EmailConfig,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS (the back-office client).
    pub client_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Shared secret with the authentication service that issues tokens.
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    /// SMS gateway messaging endpoint.
    pub api_url: String,
    pub username: Option<String>,
    pub api_key: Option<String>,
    /// Optional registered sender id (alphanumeric or short code).
    pub sender_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    /// From address; falls back to `smtp_user` when unset.
    pub from_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Total delivery attempts per job before the notification is marked FAILED.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles on each further attempt.
    pub base_backoff_ms: u64,
    /// Growth factor between consecutive backoff waits.
    pub backoff_multiplier: u32,
    /// Cap for exponential backoff (milliseconds).
    pub max_backoff_ms: u64,
    /// How often the worker polls for due jobs.
    pub poll_interval_ms: u64,
    /// Maximum jobs claimed and processed in parallel per poll.
    pub worker_concurrency: u32,
    /// Lease duration per claimed job. Must exceed the expected send latency
    /// so a slow attempt is never handed to a second worker.
    pub lease_ms: u64,
    /// Bound on a single channel send so a hung transport cannot occupy a
    /// worker indefinitely. A timeout counts as a failed attempt.
    pub send_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                client_url: env::var("CLIENT_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/clinic_notify.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
            },
            sms: SmsConfig {
                api_url: env::var("SMS_API_URL").unwrap_or_else(|_| {
                    "https://api.africastalking.com/version1/messaging".to_string()
                }),
                username: env::var("AT_USERNAME").ok(),
                api_key: env::var("AT_API_KEY").ok(),
                sender_id: env::var("AT_SENDER_ID").ok(),
            },
            email: EmailConfig {
                smtp_host: env::var("SMTP_HOST").ok(),
                smtp_port: env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .unwrap_or(587),
                smtp_user: env::var("SMTP_USER").ok(),
                smtp_pass: env::var("SMTP_PASS").ok(),
                from_address: env::var("SMTP_FROM").ok(),
            },
            delivery: DeliveryConfig {
                max_attempts: env::var("DELIVERY_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                base_backoff_ms: env::var("DELIVERY_BASE_BACKOFF_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .unwrap_or(5000),
                backoff_multiplier: env::var("DELIVERY_BACKOFF_MULTIPLIER")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                max_backoff_ms: env::var("DELIVERY_MAX_BACKOFF_MS")
                    .unwrap_or_else(|_| "3600000".to_string())
                    .parse()
                    .unwrap_or(3_600_000),
                poll_interval_ms: env::var("DELIVERY_POLL_INTERVAL_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .unwrap_or(1000),
                worker_concurrency: env::var("DELIVERY_WORKER_CONCURRENCY")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()
                    .unwrap_or(4),
                lease_ms: env::var("DELIVERY_LEASE_MS")
                    .unwrap_or_else(|_| "60000".to_string())
                    .parse()
                    .unwrap_or(60_000),
                send_timeout_ms: env::var("DELIVERY_SEND_TIMEOUT_MS")
                    .unwrap_or_else(|_| "30000".to_string())
                    .parse()
                    .unwrap_or(30_000),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                client_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/clinic_notify.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
            },
            sms: SmsConfig {
                api_url: "https://api.africastalking.com/version1/messaging".to_string(),
                username: None,
                api_key: None,
                sender_id: None,
            },
            email: EmailConfig {
                smtp_host: None,
                smtp_port: 587,
                smtp_user: None,
                smtp_pass: None,
                from_address: None,
            },
            delivery: DeliveryConfig {
                max_attempts: 3,
                base_backoff_ms: 5000,
                backoff_multiplier: 2,
                max_backoff_ms: 3_600_000,
                poll_interval_ms: 1000,
                worker_concurrency: 4,
                lease_ms: 60_000,
                send_timeout_ms: 30_000,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delivery_policy_is_bounded() {
        let cfg = Config::default();
        assert_eq!(cfg.delivery.max_attempts, 3);
        assert_eq!(cfg.delivery.base_backoff_ms, 5000);
        // The lease must outlive a single send attempt.
        assert!(cfg.delivery.lease_ms > cfg.delivery.send_timeout_ms);
    }
}
