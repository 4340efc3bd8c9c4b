use sqlx::SqlitePool;

use crate::db::models::MessageTemplate;
use crate::error::{AppError, AppResult};

pub struct MessageTemplateRepository;

const COLUMNS: &str = r#"
    id, code, name, channel, subject_template, body_template, variables, active
"#;

impl MessageTemplateRepository {
    pub async fn find_active(
        pool: &SqlitePool,
        code: &str,
        channel: &str,
    ) -> AppResult<Option<MessageTemplate>> {
        let row = sqlx::query_as::<_, MessageTemplate>(&format!(
            "SELECT {COLUMNS} FROM message_templates WHERE code = ? AND channel = ? AND active = 1"
        ))
        .bind(code)
        .bind(channel)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }
}
