use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub core: CoreConfig,
    pub channels: ChannelsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Tuning knobs for the dispatch pipeline: worker pool size, retry scheduler
/// cadence, lease semantics and default TTLs. Field names mirror the
/// `core.*` configuration keys.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    /// Delivery concurrency.
    pub worker_count: usize,
    /// Scheduler tick, in seconds.
    pub retry_poll_interval_s: u64,
    /// Per-tick lease cap passed to `lease_due_retries`.
    pub retry_batch_limit: i64,
    /// Max time a row may sit in `SENDING` before it may be re-leased.
    pub lease_timeout_s: i64,
    /// Default `expires_at` offset applied when a request omits one.
    pub notification_ttl_s: i64,
    /// HMAC key used to sign outbound webhook payloads.
    pub webhook_secret: String,
    /// Used when an `ApiClient` row omits `rate_limit`.
    pub default_rate_limit_per_min: u32,
    /// Bounded timeout applied to every outbound call (adapter + webhook).
    pub outbound_timeout_s: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelsConfig {
    pub smtp: SmtpConfig,
    pub telegram: TelegramConfig,
    pub sms: SmsConfig,
    pub whatsapp: WhatsAppConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
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
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/app.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            core: CoreConfig {
                worker_count: env::var("CORE_WORKER_COUNT")
                    .unwrap_or_else(|_| "16".to_string())
                    .parse()
                    .unwrap_or(16),
                retry_poll_interval_s: env::var("CORE_RETRY_POLL_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
                retry_batch_limit: env::var("CORE_RETRY_BATCH_LIMIT")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .unwrap_or(100),
                lease_timeout_s: env::var("CORE_LEASE_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
                notification_ttl_s: env::var("CORE_NOTIFICATION_TTL_SECONDS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .unwrap_or(86400),
                webhook_secret: env::var("CORE_WEBHOOK_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("CORE_WEBHOOK_SECRET".to_string()))?,
                default_rate_limit_per_min: env::var("CORE_DEFAULT_RATE_LIMIT_PER_MIN")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .unwrap_or(100),
                outbound_timeout_s: env::var("CORE_OUTBOUND_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            },
            channels: ChannelsConfig {
                smtp: SmtpConfig {
                    host: env::var("SMTP_HOST").ok(),
                    port: env::var("SMTP_PORT")
                        .unwrap_or_else(|_| "587".to_string())
                        .parse()
                        .unwrap_or(587),
                    username: env::var("SMTP_USERNAME").ok(),
                    password: env::var("SMTP_PASSWORD").ok(),
                    from_address: env::var("SMTP_FROM_ADDRESS").ok(),
                },
                telegram: TelegramConfig {
                    bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
                },
                sms: SmsConfig {
                    api_url: env::var("SMS_API_URL").ok(),
                    api_key: env::var("SMS_API_KEY").ok(),
                    sender: env::var("SMS_SENDER").ok(),
                },
                whatsapp: WhatsAppConfig {
                    api_url: env::var("WHATSAPP_API_URL").ok(),
                    api_key: env::var("WHATSAPP_API_KEY").ok(),
                },
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
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
            },
            core: CoreConfig {
                worker_count: 16,
                retry_poll_interval_s: 60,
                retry_batch_limit: 100,
                lease_timeout_s: 300,
                notification_ttl_s: 86400,
                webhook_secret: String::new(),
                default_rate_limit_per_min: 100,
                outbound_timeout_s: 30,
            },
            channels: ChannelsConfig {
                smtp: SmtpConfig {
                    host: None,
                    port: 587,
                    username: None,
                    password: None,
                    from_address: None,
                },
                telegram: TelegramConfig { bot_token: None },
                sms: SmsConfig {
                    api_url: None,
                    api_key: None,
                    sender: None,
                },
                whatsapp: WhatsAppConfig {
                    api_url: None,
                    api_key: None,
                },
            },
        }
    }
}
