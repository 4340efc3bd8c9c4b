use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApiClient {
    pub id: String,
    pub name: String,
    pub api_key_hash: String,
    pub api_key_prefix: String,
    pub active: bool,
    pub rate_limit: i64,
    /// JSON-encoded array of allowed channel names; empty array means "all".
    pub allowed_channels: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiClient {
    pub fn allowed_channels(&self) -> Vec<String> {
        serde_json::from_str(&self.allowed_channels).unwrap_or_default()
    }

    pub fn allows(&self, channel: &str) -> bool {
        let allowed = self.allowed_channels();
        allowed.is_empty() || allowed.iter().any(|c| c.eq_ignore_ascii_case(channel))
    }
}
