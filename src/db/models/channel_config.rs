use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Unhealthy => "UNHEALTHY",
            HealthStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "HEALTHY" => HealthStatus::Healthy,
            "UNHEALTHY" => HealthStatus::Unhealthy,
            _ => HealthStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel: String,
    pub enabled: bool,
    pub provider_name: String,
    pub credentials: Option<Vec<u8>>,
    pub settings: String,
    pub priority: i64,
    pub daily_limit: Option<i64>,
    pub daily_sent_count: i64,
    pub health_status: String,
    pub last_health_check: Option<DateTime<Utc>>,
}

impl ChannelConfig {
    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::parse(&self.health_status)
    }

    /// `spec.md` §4.4/§5: exceeding the daily cap fails fast with
    /// `DAILY_LIMIT_EXCEEDED, retryable=false`.
    pub fn daily_limit_exceeded(&self) -> bool {
        matches!(self.daily_limit, Some(limit) if self.daily_sent_count >= limit)
    }
}
