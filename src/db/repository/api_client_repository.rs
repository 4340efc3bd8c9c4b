use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::ApiClient;
use crate::error::{AppError, AppResult};

pub struct ApiClientRepository;

const COLUMNS: &str = r#"
    id, name, api_key_hash, api_key_prefix, active, rate_limit,
    allowed_channels, created_at, last_used_at
"#;

impl ApiClientRepository {
    pub async fn find_by_api_key_hash(
        pool: &SqlitePool,
        api_key_hash: &str,
    ) -> AppResult<Option<ApiClient>> {
        let row = sqlx::query_as::<_, ApiClient>(&format!(
            "SELECT {COLUMNS} FROM api_clients WHERE api_key_hash = ?"
        ))
        .bind(api_key_hash)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<ApiClient>> {
        let row = sqlx::query_as::<_, ApiClient>(&format!(
            "SELECT {COLUMNS} FROM api_clients WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Best-effort; failures here never fail ingress (`spec.md` §4.6 step 6).
    pub async fn touch_last_used(pool: &SqlitePool, id: &str) -> AppResult<()> {
        sqlx::query("UPDATE api_clients SET last_used_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
