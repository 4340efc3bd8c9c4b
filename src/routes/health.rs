use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub components: std::collections::HashMap<String, String>,
}

/// `GET /api/v1/health` (`spec.md` §6, extended per SPEC_FULL.md): rolls up
/// `Router::health_check_all` into a per-channel status map. WHATSAPP is a
/// declared placeholder and does not appear in the map.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let checks = state.router.health_check_all().await;
    let components = checks
        .into_iter()
        .map(|(channel, healthy)| {
            (
                channel.as_str().to_ascii_lowercase(),
                if healthy { "healthy" } else { "unhealthy" }.to_string(),
            )
        })
        .collect();

    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components,
    };

    (StatusCode::OK, Json(response))
}
