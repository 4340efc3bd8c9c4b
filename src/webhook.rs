//! Webhook Notifier (`spec.md` §4.8): a best-effort, asynchronous, signed
//! POST fired on terminal delivery events. Failures are logged and dropped —
//! they have no bearing on notification state.
//!
//! The HMAC construction mirrors the inbound signature verification in
//! `services/webhooks.rs::verify_signature`, run in reverse (sign instead
//! of verify).

use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::db::models::{Channel, Notification};
use crate::masking::mask_recipient;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Sent,
    Failed,
}

impl Event {
    fn as_str(&self) -> &'static str {
        match self {
            Event::Sent => "SENT",
            Event::Failed => "FAILED",
        }
    }
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    secret: String,
}

impl WebhookNotifier {
    pub fn new(secret: String, timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client builds"),
            secret,
        }
    }

    fn build_payload(
        &self,
        notification: &Notification,
        event: Event,
        used_channel: Option<Channel>,
    ) -> serde_json::Value {
        let channel = used_channel.unwrap_or_else(|| notification.channel());
        let mut payload = serde_json::json!({
            "event": event.as_str(),
            "notification_id": notification.id,
            "channel": channel.as_str(),
            "recipient": mask_recipient(channel, &notification.recipient),
            "status": event.as_str(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        if let Some(metadata) = &notification.metadata {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(metadata) {
                payload["metadata"] = value;
            }
        }

        if event == Event::Failed {
            payload["error_code"] = notification.error_code.clone().into();
            payload["error_message"] = notification.error_message.clone().into();
            payload["retry_count"] = notification.retry_count.into();
        }

        if event == Event::Sent {
            if let Some(pmid) = &notification.provider_message_id {
                payload["provider_message_id"] = pmid.clone().into();
            }
        }

        payload
    }

    fn sign(&self, payload_bytes: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload_bytes);
        let signature = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        format!("sha256={signature}")
    }

    /// `spec.md` §4.8: returns immediately when no callback URL is set; any
    /// non-2xx (or transport error) is logged and dropped, never retried.
    pub async fn fire(&self, notification: &Notification, event: Event, used_channel: Option<Channel>) {
        let Some(callback_url) = notification.callback_url.as_ref().filter(|u| !u.is_empty()) else {
            return;
        };

        let payload = self.build_payload(notification, event, used_channel);
        let payload_bytes = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(notification_id = %notification.id, error = %e, "failed to serialize webhook payload");
                return;
            }
        };

        let signature = self.sign(&payload_bytes);
        let timestamp_ms = Utc::now().timestamp_millis();

        let result = self
            .client
            .post(callback_url.as_str())
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", signature)
            .header("X-Webhook-Timestamp", timestamp_ms.to_string())
            .header("X-Webhook-Event", event.as_str())
            .body(payload_bytes)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(notification_id = %notification.id, "webhook delivered");
            }
            Ok(response) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    status = %response.status(),
                    "webhook call returned a non-success status"
                );
            }
            Err(e) => {
                tracing::warn!(notification_id = %notification.id, error = %e, "webhook call failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc as ChronoUtc;

    fn sample_notification() -> Notification {
        Notification {
            id: "11111111-1111-1111-1111-111111111111".to_string(),
            client_id: "client-1".to_string(),
            channel: "EMAIL".to_string(),
            recipient: "user@example.com".to_string(),
            subject: Some("Hi".to_string()),
            body: "Hello".to_string(),
            status: "SENT".to_string(),
            priority: "NORMAL".to_string(),
            retry_count: 0,
            max_retries: 5,
            next_retry_at: None,
            error_code: None,
            error_message: None,
            provider_message_id: Some("mid-1".to_string()),
            idempotency_key: None,
            callback_url: Some("https://example.test/callback".to_string()),
            metadata: None,
            created_at: ChronoUtc::now(),
            updated_at: ChronoUtc::now(),
            sent_at: Some(ChronoUtc::now()),
            expires_at: ChronoUtc::now(),
        }
    }

    #[test]
    fn signature_is_reproducible_for_the_same_payload() {
        let notifier = WebhookNotifier::new("test-secret".to_string(), std::time::Duration::from_secs(5));
        let notification = sample_notification();
        let payload = notifier.build_payload(&notification, Event::Sent, None);
        let bytes = serde_json::to_vec(&payload).unwrap();

        let sig_a = notifier.sign(&bytes);
        let sig_b = notifier.sign(&bytes);
        assert_eq!(sig_a, sig_b);
        assert!(sig_a.starts_with("sha256="));
    }

    #[test]
    fn payload_masks_the_recipient() {
        let notifier = WebhookNotifier::new("test-secret".to_string(), std::time::Duration::from_secs(5));
        let notification = sample_notification();
        let payload = notifier.build_payload(&notification, Event::Sent, None);
        assert_eq!(payload["recipient"], "us***@example.com");
        assert_eq!(payload["provider_message_id"], "mid-1");
    }

    #[test]
    fn failed_event_carries_error_fields() {
        let notifier = WebhookNotifier::new("test-secret".to_string(), std::time::Duration::from_secs(5));
        let mut notification = sample_notification();
        notification.error_code = Some("INVALID_RECIPIENT".to_string());
        notification.error_message = Some("bad address".to_string());
        let payload = notifier.build_payload(&notification, Event::Failed, None);
        assert_eq!(payload["error_code"], "INVALID_RECIPIENT");
        assert_eq!(payload["event"], "FAILED");
    }
}
