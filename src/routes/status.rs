use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::ApiKeyAuth;
use crate::db::repository::NotificationRepository;
use crate::error::{AppError, AppResult};
use crate::masking::mask_recipient;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/status/:id", get(status))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: String,
    pub channel: String,
    pub recipient: String,
    pub retry_count: i64,
    pub max_retries: i64,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub provider_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// `GET /api/v1/status/{id}` (`spec.md` §6): a client may only look up its
/// own notifications, and the recipient is always masked in the response.
async fn status(
    State(state): State<Arc<AppState>>,
    ApiKeyAuth(client): ApiKeyAuth,
    Path(id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    let notification = NotificationRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))?;

    if notification.client_id != client.id {
        return Err(AppError::NotFound(format!("notification {id} not found")));
    }

    let channel = notification.channel();
    Ok(Json(StatusResponse {
        id: notification.id,
        status: notification.status,
        channel: notification.channel,
        recipient: mask_recipient(channel, &notification.recipient),
        retry_count: notification.retry_count,
        max_retries: notification.max_retries,
        next_retry_at: notification.next_retry_at,
        error_code: notification.error_code,
        error_message: notification.error_message,
        provider_message_id: notification.provider_message_id,
        created_at: notification.created_at,
        updated_at: notification.updated_at,
        sent_at: notification.sent_at,
    }))
}
