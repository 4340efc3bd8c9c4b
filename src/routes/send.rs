use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};

use crate::auth::ApiKeyAuth;
use crate::db::models::Channel;
use crate::dispatcher::{self, SendRequest, SubmitResponse};
use crate::error::{AppError, AppResult};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/send", post(send))
}

fn rate_limit_headers(outcome: &crate::rate_limit::RateLimitOutcome) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-ratelimit-limit", outcome.limit.into());
    headers.insert("x-ratelimit-remaining", outcome.remaining.into());
    headers.insert("x-ratelimit-reset", outcome.reset_epoch_ms.into());
    headers
}

/// `POST /api/v1/send` (`spec.md` §6): authenticates, rate-limits, then
/// hands off to the Dispatcher.
async fn send(
    State(state): State<Arc<AppState>>,
    ApiKeyAuth(client): ApiKeyAuth,
    Json(request): Json<SendRequest>,
) -> AppResult<(HeaderMap, Json<SubmitResponse>)> {
    let limit = if client.rate_limit > 0 {
        client.rate_limit as u32
    } else {
        state.config.core.default_rate_limit_per_min
    };

    let outcome = state.rate_limiter.check(&client.id, limit);
    let headers = rate_limit_headers(&outcome);

    if !outcome.allowed {
        return Err(AppError::RateLimitExceeded {
            limit: outcome.limit,
            remaining: outcome.remaining,
            reset_epoch_ms: outcome.reset_epoch_ms,
        });
    }

    if let Some(channel) = Channel::parse(&request.channel) {
        if !client.allows(channel.as_str()) {
            return Err(AppError::InvalidChannel(format!(
                "client is not permitted to use channel {channel}"
            )));
        }
    }

    let response = dispatcher::submit(&state, &client.id, request).await?;
    Ok((headers, Json(response)))
}
