use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use http::HeaderValue;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod channels;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod masking;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod scheduler;
pub mod template;
pub mod webhook;

use channels::email::EmailAdapter;
use channels::sms::SmsAdapter;
use channels::telegram::TelegramAdapter;
use channels::whatsapp::WhatsAppAdapter;
use channels::Adapter;
use config::Config;
use db::models::Channel;
use rate_limit::RateLimiter;
use router::Router as ChannelRouter;
use webhook::WebhookNotifier;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub router: ChannelRouter,
    pub rate_limiter: RateLimiter,
    pub webhook: WebhookNotifier,
    /// Bounds how many delivery attempts run concurrently across both the
    /// ingress path and the Retry Scheduler (`spec.md` §5, default 16).
    pub worker_permits: tokio::sync::Semaphore,
}

/// Redacts credentials from a database URL before it is logged.
pub fn redact_db_url(db_url: &str) -> String {
    if let Ok(url) = url::Url::parse(db_url) {
        let scheme = url.scheme();
        let host = url.host_str().unwrap_or("");
        let port_part = url.port().map(|p| format!(":{p}")).unwrap_or_default();
        format!("{}://{}{}{}", scheme, host, port_part, url.path())
    } else if let Some(at_pos) = db_url.find('@') {
        format!("(redacted){}", &db_url[at_pos + 1..])
    } else {
        "(redacted)".to_string()
    }
}

/// Opens the configured SQLite pool and runs migrations
/// (shape follows `services/init.rs::init_db`).
pub async fn init_db(config: &Config) -> anyhow::Result<sqlx::SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("connecting to database: {}", redact_db_url(db_url));

    let db_path = db_url.strip_prefix("sqlite://").unwrap_or(db_url);

    let (connect_options, max_connections) = if db_path == ":memory:" {
        // A plain `:memory:` filename hands each pooled connection its own
        // private database. Cap the pool at one connection so migrations
        // and subsequent queries all land on the same in-memory database.
        (sqlx::sqlite::SqliteConnectOptions::new().filename(":memory:"), 1)
    } else {
        let db_file_path = Path::new(db_path);
        if let Some(parent) = db_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        (options, config.database.max_connections)
    };

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_options)
        .await?;

    tracing::info!("running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

fn build_channel_router(config: &Config) -> ChannelRouter {
    let timeout = Duration::from_secs(config.core.outbound_timeout_s);

    let mut adapters: HashMap<Channel, Box<dyn Adapter>> = HashMap::new();
    adapters.insert(Channel::Email, Box::new(EmailAdapter::new(&config.channels.smtp)));
    adapters.insert(
        Channel::Telegram,
        Box::new(TelegramAdapter::new(&config.channels.telegram, timeout)),
    );
    adapters.insert(Channel::Sms, Box::new(SmsAdapter::new(&config.channels.sms, timeout)));
    adapters.insert(Channel::Whatsapp, Box::new(WhatsAppAdapter::new(&config.channels.whatsapp)));

    ChannelRouter::new(adapters)
}

/// Builds `AppState` from a DB pool and configuration. Split out from
/// `main` so tests can assemble the same state against an in-memory pool.
pub fn build_state(db: sqlx::SqlitePool, config: Config) -> Arc<AppState> {
    let outbound_timeout = Duration::from_secs(config.core.outbound_timeout_s);
    let worker_permits = tokio::sync::Semaphore::new(config.core.worker_count);
    Arc::new(AppState {
        router: build_channel_router(&config),
        rate_limiter: RateLimiter::new(),
        webhook: WebhookNotifier::new(config.core.webhook_secret.clone(), outbound_timeout),
        worker_permits,
        db,
        config,
    })
}

/// Assembles the axum app: health plus the three authed routes, all nested
/// under `/api/v1`, CORS, and request tracing. No background workers are
/// started here — `main`
/// spawns those separately so tests can drive the HTTP surface without a
/// live scheduler running underneath them.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(routes::health::router())
                .merge(routes::send::router())
                .merge(routes::status::router())
                .merge(routes::retry::router()),
        )
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .server
                        .frontend_url
                        .parse::<HeaderValue>()
                        .expect("invalid FRONTEND_URL for CORS"),
                )
                .allow_methods([http::Method::GET, http::Method::POST])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::HeaderName::from_static(auth::API_KEY_HEADER),
                ]),
        )
}
