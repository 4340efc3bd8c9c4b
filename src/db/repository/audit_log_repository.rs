use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub struct AuditLogRepository;

impl AuditLogRepository {
    /// Best-effort write (`spec.md` §4.6 step 5: "audit failures do not fail
    /// ingress"). Callers should log and discard the error rather than
    /// propagate it.
    pub async fn record(pool: &SqlitePool, action: &str, entity_id: &str) -> AppResult<()> {
        sqlx::query("INSERT INTO audit_log (id, action, entity_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(action)
            .bind(entity_id)
            .bind(Utc::now())
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
