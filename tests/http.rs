//! End-to-end coverage of the HTTP surface (`spec.md` §8 scenarios),
//! driven with `tower::ServiceExt::oneshot` against an in-memory SQLite pool.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use notify_dispatch::auth::hash_api_key;
use notify_dispatch::config::Config;
use notify_dispatch::{build_app, build_state, init_db};
use serde_json::{json, Value};
use tower::ServiceExt;

const API_KEY: &str = "test-api-key-123";

async fn test_state() -> Arc<notify_dispatch::AppState> {
    let mut config = Config::default();
    config.database.url = ":memory:".to_string();
    config.core.webhook_secret = "test-webhook-secret".to_string();
    config.core.worker_count = 2;

    let pool = init_db(&config).await.expect("in-memory db initializes");

    sqlx::query(
        "INSERT INTO api_clients (id, name, api_key_hash, api_key_prefix, active, rate_limit, allowed_channels, created_at)
         VALUES (?, 'test-client', ?, 'test', 1, 100, '[]', datetime('now'))",
    )
    .bind("client-1")
    .bind(hash_api_key(API_KEY))
    .execute(&pool)
    .await
    .expect("seed api client");

    sqlx::query(
        "INSERT INTO api_clients (id, name, api_key_hash, api_key_prefix, active, rate_limit, allowed_channels, created_at)
         VALUES (?, 'rate-limited-client', ?, 'rl', 1, 1, '[]', datetime('now'))",
    )
    .bind("client-2")
    .bind(hash_api_key("rate-limited-key"))
    .execute(&pool)
    .await
    .expect("seed rate-limited client");

    build_state(pool, config)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn send_request(body: Value, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/send")
        .header("content-type", "application/json");

    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn missing_api_key_is_rejected() {
    let app = build_app(test_state().await);
    let body = json!({"channel": "EMAIL", "recipient": "user@example.com", "subject": "Hi", "message": "hello"});

    let response = app.oneshot(send_request(body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_api_key_is_rejected() {
    let app = build_app(test_state().await);
    let body = json!({"channel": "EMAIL", "recipient": "user@example.com", "subject": "Hi", "message": "hello"});

    let response = app.oneshot(send_request(body, Some("not-the-right-key"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_channel_is_rejected_with_bad_request() {
    let app = build_app(test_state().await);
    let body = json!({"channel": "CARRIER_PIGEON", "recipient": "user@example.com", "message": "hello"});

    let response = app.oneshot(send_request(body, Some(API_KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = body_json(response).await;
    assert_eq!(payload["error"]["code"], "INVALID_CHANNEL");
}

#[tokio::test]
async fn email_without_subject_is_rejected() {
    let app = build_app(test_state().await);
    let body = json!({"channel": "EMAIL", "recipient": "user@example.com", "message": "hello"});

    let response = app.oneshot(send_request(body, Some(API_KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = body_json(response).await;
    assert_eq!(payload["error"]["code"], "MISSING_SUBJECT");
}

#[tokio::test]
async fn valid_send_is_accepted_and_persisted_pending_or_later() {
    let state = test_state().await;
    let app = build_app(state.clone());
    let body = json!({
        "channel": "SMS",
        "recipient": "+15551234567",
        "message": "hello there",
    });

    let response = app.oneshot(send_request(body, Some(API_KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert!(payload["notification_id"].is_string());

    let row = notify_dispatch::db::repository::NotificationRepository::find_by_id(
        &state.db,
        payload["notification_id"].as_str().unwrap(),
    )
    .await
    .unwrap()
    .expect("notification row exists");
    assert_eq!(row.client_id, "client-1");
}

#[tokio::test]
async fn duplicate_idempotency_key_returns_the_same_notification() {
    let app = build_app(test_state().await);
    let body = json!({
        "channel": "SMS",
        "recipient": "+15551234567",
        "message": "hello there",
        "idempotency_key": "request-42",
    });

    let first = app.clone().oneshot(send_request(body.clone(), Some(API_KEY))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_payload = body_json(first).await;

    let second = app.oneshot(send_request(body, Some(API_KEY))).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_payload = body_json(second).await;

    assert_eq!(first_payload["notification_id"], second_payload["notification_id"]);
}

#[tokio::test]
async fn status_lookup_masks_the_recipient_and_scopes_to_the_owning_client() {
    let state = test_state().await;
    let app = build_app(state.clone());
    let body = json!({"channel": "SMS", "recipient": "+15551234567", "message": "hi"});

    let submit = app.clone().oneshot(send_request(body, Some(API_KEY))).await.unwrap();
    let submit_payload = body_json(submit).await;
    let id = submit_payload["notification_id"].as_str().unwrap().to_string();

    let status_req = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/status/{id}"))
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let status_resp = app.clone().oneshot(status_req).await.unwrap();
    assert_eq!(status_resp.status(), StatusCode::OK);
    let status_payload = body_json(status_resp).await;
    assert_eq!(status_payload["recipient"], "+155***67");

    let other_client_req = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/status/{id}"))
        .header("x-api-key", "rate-limited-key")
        .body(Body::empty())
        .unwrap();
    let other_resp = app.oneshot(other_client_req).await.unwrap();
    assert_eq!(other_resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rate_limit_is_enforced_per_client() {
    let app = build_app(test_state().await);
    let body = json!({"channel": "SMS", "recipient": "+15551234567", "message": "hi"});

    let first = app
        .clone()
        .oneshot(send_request(body.clone(), Some("rate-limited-key")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(send_request(body, Some("rate-limited-key"))).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn health_reports_channel_components() {
    let app = build_app(test_state().await);
    let req = Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert!(payload["components"].get("email").is_some());
    assert!(payload["components"].get("whatsapp").is_none());
}
