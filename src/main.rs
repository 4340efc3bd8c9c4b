use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notify_dispatch::config::Config;
use notify_dispatch::{build_app, build_state, init_db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notify_dispatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("starting notification dispatch service");

    let pool = init_db(&config).await?;
    let app_state = build_state(pool, config.clone());

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let worker_handles = notify_dispatch::scheduler::spawn(app_state.clone(), shutdown_tx.clone());

    let app = build_app(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>());

    tokio::select! {
        result = server => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(());
    for handle in worker_handles {
        let _ = handle.await;
    }

    Ok(())
}
