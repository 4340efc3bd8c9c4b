use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // -- ingress validation failures (never retried) --
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Subject is required for this channel")]
    MissingSubject,

    #[error("Template arguments invalid: {0}")]
    InvalidTemplateArgs(String),

    #[error("Recipient format invalid: {0}")]
    RecipientFormat(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    // -- auth / rate limit failures (never retried) --
    #[error("Missing API key")]
    MissingApiKey,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Client is inactive")]
    ClientInactive,

    #[error("Rate limit exceeded")]
    RateLimitExceeded {
        limit: u32,
        remaining: u32,
        reset_epoch_ms: i64,
    },

    // -- lookups --
    #[error("Resource not found: {0}")]
    NotFound(String),

    // -- storage failures (propagated, never swallowed) --
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::InvalidChannel(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_CHANNEL", msg.clone(), None)
            }
            AppError::MissingSubject => (
                StatusCode::BAD_REQUEST,
                "MISSING_SUBJECT",
                self.to_string(),
                None,
            ),
            AppError::InvalidTemplateArgs(msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_TEMPLATE_ARGS",
                msg.clone(),
                None,
            ),
            AppError::RecipientFormat(msg) => (
                StatusCode::BAD_REQUEST,
                "RECIPIENT_FORMAT",
                msg.clone(),
                None,
            ),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::MissingApiKey => (
                StatusCode::UNAUTHORIZED,
                "MISSING_API_KEY",
                self.to_string(),
                None,
            ),
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "INVALID_API_KEY",
                self.to_string(),
                None,
            ),
            AppError::ClientInactive => (
                StatusCode::FORBIDDEN,
                "CLIENT_INACTIVE",
                self.to_string(),
                None,
            ),
            AppError::RateLimitExceeded {
                limit,
                remaining,
                reset_epoch_ms,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                self.to_string(),
                Some(serde_json::json!({
                    "limit": limit,
                    "remaining": remaining,
                    "reset_epoch_ms": reset_epoch_ms,
                })),
            ),
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None)
            }
            AppError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::Migration(e) => {
                tracing::error!("migration error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "A migration error occurred".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        let mut response = (status, Json(body)).into_response();

        // `spec.md` §6 requires rate-limit headers on a 429.
        if let AppError::RateLimitExceeded {
            limit,
            remaining,
            reset_epoch_ms,
        } = &self
        {
            let retry_after_secs = ((reset_epoch_ms - chrono::Utc::now().timestamp_millis()) / 1000).max(0);
            let headers = response.headers_mut();
            headers.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from_str(&retry_after_secs.to_string()).unwrap(),
            );
            headers.insert("x-ratelimit-limit", HeaderValue::from(*limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(*remaining));
            headers.insert("x-ratelimit-reset", HeaderValue::from(*reset_epoch_ms));
        }

        response
    }
}

pub type AppResult<T> = Result<T, AppError>;
