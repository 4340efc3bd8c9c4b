use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::auth::ApiKeyAuth;
use crate::db::repository::{AuditLogRepository, NotificationRepository};
use crate::dispatcher::{self, SubmitResponse};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/retry/:id", post(retry))
}

/// `POST /api/v1/retry/{id}` (`spec.md` §8 P5): the administrative escape
/// hatch that forces a terminal row back to `PENDING` and immediately
/// attempts delivery again.
async fn retry(
    State(state): State<Arc<AppState>>,
    ApiKeyAuth(client): ApiKeyAuth,
    Path(id): Path<String>,
) -> AppResult<Json<SubmitResponse>> {
    let notification = NotificationRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))?;

    if notification.client_id != client.id {
        return Err(AppError::NotFound(format!("notification {id} not found")));
    }

    if !notification.status().is_terminal() {
        return Err(AppError::BadRequest(
            "only a terminal notification may be force-retried".to_string(),
        ));
    }

    let reset = NotificationRepository::force_retry(&state.db, &id).await?;

    if let Err(e) = AuditLogRepository::record(&state.db, "FORCE_RETRY", &reset.id).await {
        tracing::warn!(notification_id = %reset.id, error = %e, "failed to write audit record");
    }

    let state = state.clone();
    let notification_id = reset.id.clone();
    tokio::spawn(async move {
        if let Err(e) = dispatcher::attempt_delivery(&state, &notification_id).await {
            tracing::warn!(notification_id = %notification_id, error = %e, "forced retry delivery attempt failed to run");
        }
    });

    Ok(Json(reset.into()))
}
