//! Retry Scheduler (`spec.md` §4.7): a 60-second-tick background worker that
//! leases due retries and hands each off to the Dispatcher's delivery
//! attempt, plus a companion sweep for expired notifications.
//!
//! Grounded in `services/init.rs::spawn_background_workers`'s shutdown
//! pattern: each loop holds its own `broadcast::Receiver` and races it
//! against `tokio::time::sleep` so the process can drain in-flight work
//! before exiting.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::db::repository::NotificationRepository;
use crate::dispatcher;
use crate::webhook::Event;
use crate::AppState;

pub fn spawn(
    state: Arc<AppState>,
    shutdown: broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    vec![spawn_retry_loop(state.clone(), shutdown.clone()), spawn_expiry_loop(state, shutdown)]
}

fn spawn_retry_loop(state: Arc<AppState>, shutdown: broadcast::Sender<()>) -> tokio::task::JoinHandle<()> {
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                tracing::info!("retry scheduler received shutdown signal");
                break;
            }

            tracing::debug!("retry scheduler: reclaiming expired leases and leasing due retries");

            if let Err(e) =
                NotificationRepository::reclaim_expired_leases(&state.db, Utc::now(), state.config.core.lease_timeout_s)
                    .await
            {
                tracing::warn!(error = %e, "failed to reclaim expired leases");
            }

            match NotificationRepository::lease_due_retries(
                &state.db,
                Utc::now(),
                state.config.core.retry_batch_limit,
            )
            .await
            {
                Ok(leased) => {
                    if !leased.is_empty() {
                        tracing::info!(count = leased.len(), "leased due retries");
                    }
                    for notification in leased {
                        let state = state.clone();
                        tokio::spawn(async move {
                            let notification_id = notification.id.clone();
                            if let Err(e) = dispatcher::deliver_leased(&state, notification).await {
                                tracing::warn!(
                                    notification_id = %notification_id,
                                    error = %e,
                                    "retry delivery attempt failed to run"
                                );
                            }
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to lease due retries");
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("retry scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(std::time::Duration::from_secs(state.config.core.retry_poll_interval_s)) => {}
            }
        }
    })
}

fn spawn_expiry_loop(state: Arc<AppState>, shutdown: broadcast::Sender<()>) -> tokio::task::JoinHandle<()> {
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                tracing::info!("expiry sweep received shutdown signal");
                break;
            }

            match NotificationRepository::expire_due(&state.db, Utc::now()).await {
                Ok(expired) => {
                    for notification in expired {
                        tracing::info!(notification_id = %notification.id, "notification expired before delivery");
                        state.webhook.fire(&notification, Event::Failed, None).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to sweep expired notifications");
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("expiry sweep shutting down");
                    break;
                }
                _ = tokio::time::sleep(std::time::Duration::from_secs(state.config.core.retry_poll_interval_s)) => {}
            }
        }
    })
}
