//! Dispatcher (`spec.md` §4.6): ingress validation, idempotency, persistence,
//! and the delivery-attempt state machine shared by the HTTP ingress path
//! and the Retry Scheduler.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Channel, NewNotification, Notification, Priority};
use crate::db::repository::{
    AuditLogRepository, MessageTemplateRepository, NotificationRepository,
};
use crate::error::{AppError, AppResult};
use crate::router::default_fallback;
use crate::template;
use crate::webhook::Event;
use crate::AppState;

/// Fixed backoff table (`spec.md` §4.6): 1, 5, 15, 60, 240 minutes. Attempts
/// beyond the table reuse the last entry.
const BACKOFF_MINUTES: [i64; 5] = [1, 5, 15, 60, 240];

pub fn backoff_for_attempt(attempt: i64) -> Duration {
    let idx = (attempt.max(1) - 1).min(BACKOFF_MINUTES.len() as i64 - 1) as usize;
    Duration::minutes(BACKOFF_MINUTES[idx])
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub channel: String,
    pub recipient: String,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub template_code: Option<String>,
    #[serde(default)]
    pub template_variables: HashMap<String, String>,
    pub priority: Option<String>,
    pub idempotency_key: Option<String>,
    pub callback_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub notification_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for SubmitResponse {
    fn from(n: Notification) -> Self {
        Self {
            notification_id: n.id,
            status: n.status,
            created_at: n.created_at,
        }
    }
}

struct Rendered {
    subject: Option<String>,
    body: String,
}

async fn render_request(state: &AppState, channel: Channel, req: &SendRequest) -> AppResult<Rendered> {
    if let Some(code) = &req.template_code {
        let template = MessageTemplateRepository::find_active(&state.db, code, channel.as_str())
            .await?
            .ok_or_else(|| {
                AppError::InvalidTemplateArgs(format!("no active template '{code}' for {channel}"))
            })?;

        let required = template.variables();
        template::validate(&required, &req.template_variables).map_err(|missing| {
            AppError::InvalidTemplateArgs(format!("missing template variables: {}", missing.join(", ")))
        })?;

        let subject = template
            .subject_template
            .as_ref()
            .map(|t| template::render(t, &req.template_variables));
        let body = template::render(&template.body_template, &req.template_variables);

        return Ok(Rendered { subject, body });
    }

    let body = req
        .message
        .clone()
        .ok_or_else(|| AppError::BadRequest("body is required unless a template_code is supplied".to_string()))?;

    Ok(Rendered {
        subject: req.subject.clone(),
        body,
    })
}

fn validate_channel(raw: &str) -> AppResult<Channel> {
    Channel::parse(raw).ok_or_else(|| AppError::InvalidChannel(raw.to_string()))
}

/// Per-channel recipient shape check at ingress (`spec.md` §3, §7
/// `RECIPIENT_FORMAT`). Adapter-level rejection still exists as a backstop
/// for anything this coarse check lets through, but malformed recipients
/// should fail fast here instead of burning a delivery attempt.
fn validate_recipient_format(channel: Channel, recipient: &str) -> AppResult<()> {
    let valid = match channel {
        Channel::Email => {
            let parts: Vec<&str> = recipient.splitn(2, '@').collect();
            matches!(parts.as_slice(), [local, domain] if !local.is_empty() && domain.contains('.'))
        }
        Channel::Sms | Channel::Whatsapp => {
            let digits = recipient.chars().filter(|c| c.is_ascii_digit()).count();
            digits >= 7 && recipient.chars().all(|c| c == '+' || c.is_ascii_digit())
        }
        Channel::Telegram => !recipient.trim().is_empty(),
    };

    if valid {
        Ok(())
    } else {
        Err(AppError::RecipientFormat(format!(
            "'{recipient}' is not a valid recipient for channel {channel}"
        )))
    }
}

/// `spec.md` §4.6 step 1-8: validates, renders, checks idempotency,
/// persists, best-effort audits, and enqueues a delivery attempt.
pub async fn submit(
    state: &Arc<AppState>,
    client_id: &str,
    req: SendRequest,
) -> AppResult<SubmitResponse> {
    let channel = validate_channel(&req.channel)?;

    if req.recipient.is_empty() || req.recipient.len() > 255 {
        return Err(AppError::BadRequest("recipient must be 1-255 characters".to_string()));
    }

    validate_recipient_format(channel, &req.recipient)?;

    if let Some(subject) = &req.subject {
        if subject.len() > 500 {
            return Err(AppError::BadRequest("subject must be at most 500 characters".to_string()));
        }
    }

    let priority = match &req.priority {
        Some(p) => Priority::parse(p).ok_or_else(|| AppError::BadRequest(format!("invalid priority: {p}")))?,
        None => Priority::Normal,
    };

    if let Some(key) = &req.idempotency_key {
        if let Some(existing) = NotificationRepository::find_by_idempotency_key(&state.db, key).await? {
            return Ok(existing.into());
        }
    }

    let rendered = render_request(state, channel, &req).await?;

    if channel == Channel::Email && rendered.subject.as_deref().unwrap_or("").is_empty() {
        return Err(AppError::MissingSubject);
    }

    if rendered.body.is_empty() {
        return Err(AppError::BadRequest("body must not be empty".to_string()));
    }

    let now = Utc::now();
    let new = NewNotification {
        client_id: client_id.to_string(),
        channel,
        recipient: req.recipient,
        subject: rendered.subject,
        body: rendered.body,
        priority,
        max_retries: 5,
        idempotency_key: req.idempotency_key,
        callback_url: req.callback_url,
        metadata: req.metadata.map(|v| v.to_string()),
        expires_at: now + Duration::seconds(state.config.core.notification_ttl_s),
    };

    let notification = match NotificationRepository::insert(&state.db, new).await {
        Ok(row) => row,
        Err(AppError::Database(sqlx::Error::Database(e)))
            if e.kind() == sqlx::error::ErrorKind::UniqueViolation =>
        {
            // Lost the idempotency race; the insert is the authority, so
            // read back whoever won it (`spec.md` §9).
            let key = req.idempotency_key.as_deref().unwrap_or_default();
            NotificationRepository::find_by_idempotency_key(&state.db, key)
                .await?
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("idempotency race lost but row not found")))?
        }
        Err(e) => return Err(e),
    };

    if let Err(e) = AuditLogRepository::record(&state.db, "SEND_NOTIFICATION", &notification.id).await {
        tracing::warn!(notification_id = %notification.id, error = %e, "failed to write audit record");
    }

    if let Err(e) = crate::db::repository::ApiClientRepository::touch_last_used(&state.db, client_id).await {
        tracing::warn!(client_id = %client_id, error = %e, "failed to touch client last_used_at");
    }

    let state = state.clone();
    let notification_id = notification.id.clone();
    tokio::spawn(async move {
        if let Err(e) = attempt_delivery(&state, &notification_id).await {
            tracing::warn!(notification_id = %notification_id, error = %e, "delivery attempt failed to run");
        }
    });

    Ok(notification.into())
}

/// The delivery attempt invoked right after ingress, for a freshly-inserted
/// `PENDING` row. Leases the row itself (`PENDING -> SENDING`) before
/// attempting delivery; a `None` lease means someone else already picked it
/// up or it's no longer `PENDING`.
pub async fn attempt_delivery(state: &Arc<AppState>, notification_id: &str) -> AppResult<()> {
    let notification = match NotificationRepository::lease_for_send(&state.db, notification_id).await? {
        Some(n) => n,
        None => return Ok(()),
    };

    deliver(state, notification).await
}

/// The delivery attempt for a row the Retry Scheduler already leased via
/// `lease_due_retries` (its own `UPDATE ... RETURNING` already flipped the
/// row to `SENDING`) — re-leasing here would always miss, since
/// `lease_for_send` only matches rows still `PENDING`.
pub async fn deliver_leased(state: &Arc<AppState>, notification: Notification) -> AppResult<()> {
    deliver(state, notification).await
}

/// Shared delivery-attempt body (`spec.md` §4.6/§4.7): send with fallback,
/// then mark sent/scheduled-retry/failed. Bounded by `AppState::worker_permits`
/// so the process never runs more than `core.worker_count` sends concurrently.
async fn deliver(state: &Arc<AppState>, notification: Notification) -> AppResult<()> {
    let _permit = state
        .worker_permits
        .acquire()
        .await
        .expect("worker semaphore is never closed");

    let channel = notification.channel();
    let fallback = default_fallback(channel);

    let result = state
        .router
        .send_with_fallback(
            &state.db,
            channel,
            fallback,
            &notification.recipient,
            notification.subject.as_deref(),
            &notification.body,
        )
        .await;

    if result.ok {
        let sent = NotificationRepository::mark_sent(&state.db, &notification.id, result.provider_message_id)
            .await?;
        state.webhook.fire(&sent, Event::Sent, result.used_channel).await;
        return Ok(());
    }

    let code = result.error_code.unwrap_or_else(|| "SERVER_ERROR".to_string());
    let message = result.error_message.unwrap_or_else(|| "delivery failed".to_string());

    if result.retryable && notification.retry_count + 1 < notification.max_retries {
        let next_retry_count = notification.retry_count + 1;
        let next_retry_at = Utc::now() + backoff_for_attempt(next_retry_count);
        NotificationRepository::schedule_retry(
            &state.db,
            &notification.id,
            next_retry_count,
            next_retry_at,
            &code,
            &message,
        )
        .await?;
        return Ok(());
    }

    let failed = NotificationRepository::mark_failed(&state.db, &notification.id, &code, &message).await?;
    state.webhook.fire(&failed, Event::Failed, result.used_channel).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_follows_the_fixed_table() {
        assert_eq!(backoff_for_attempt(1), Duration::minutes(1));
        assert_eq!(backoff_for_attempt(2), Duration::minutes(5));
        assert_eq!(backoff_for_attempt(3), Duration::minutes(15));
        assert_eq!(backoff_for_attempt(4), Duration::minutes(60));
        assert_eq!(backoff_for_attempt(5), Duration::minutes(240));
    }

    #[test]
    fn backoff_caps_at_the_last_entry() {
        assert_eq!(backoff_for_attempt(6), Duration::minutes(240));
        assert_eq!(backoff_for_attempt(100), Duration::minutes(240));
    }

    #[test]
    fn accepts_well_formed_recipients_per_channel() {
        assert!(validate_recipient_format(Channel::Email, "user@example.com").is_ok());
        assert!(validate_recipient_format(Channel::Sms, "+15551234567").is_ok());
        assert!(validate_recipient_format(Channel::Whatsapp, "15551234567").is_ok());
        assert!(validate_recipient_format(Channel::Telegram, "@some_user").is_ok());
    }

    #[test]
    fn rejects_malformed_recipients_per_channel() {
        assert!(validate_recipient_format(Channel::Email, "not-an-email").is_err());
        assert!(validate_recipient_format(Channel::Email, "user@").is_err());
        assert!(validate_recipient_format(Channel::Sms, "12345").is_err());
        assert!(validate_recipient_format(Channel::Sms, "call-me-maybe").is_err());
        assert!(validate_recipient_format(Channel::Telegram, "   ").is_err());
    }
}
