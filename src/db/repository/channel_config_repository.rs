use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::ChannelConfig;
use crate::error::{AppError, AppResult};

pub struct ChannelConfigRepository;

const COLUMNS: &str = r#"
    channel, enabled, provider_name, credentials, settings, priority,
    daily_limit, daily_sent_count, health_status, last_health_check
"#;

impl ChannelConfigRepository {
    pub async fn find(pool: &SqlitePool, channel: &str) -> AppResult<Option<ChannelConfig>> {
        let row = sqlx::query_as::<_, ChannelConfig>(&format!(
            "SELECT {COLUMNS} FROM channel_configs WHERE channel = ?"
        ))
        .bind(channel)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn list(pool: &SqlitePool) -> AppResult<Vec<ChannelConfig>> {
        let rows = sqlx::query_as::<_, ChannelConfig>(&format!("SELECT {COLUMNS} FROM channel_configs"))
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(rows)
    }

    pub async fn increment_daily_sent(pool: &SqlitePool, channel: &str) -> AppResult<()> {
        sqlx::query("UPDATE channel_configs SET daily_sent_count = daily_sent_count + 1 WHERE channel = ?")
            .bind(channel)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Reset by a daily maintenance task (out of scope here, per `spec.md`
    /// §5 — the counter field is reserved but no cron is specified).
    pub async fn reset_daily_counters(pool: &SqlitePool) -> AppResult<()> {
        sqlx::query("UPDATE channel_configs SET daily_sent_count = 0")
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn record_health_check(
        pool: &SqlitePool,
        channel: &str,
        healthy: bool,
    ) -> AppResult<()> {
        let status = if healthy { "HEALTHY" } else { "UNHEALTHY" };
        sqlx::query(
            "UPDATE channel_configs SET health_status = ?, last_health_check = ? WHERE channel = ?",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(channel)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }
}
