use async_trait::async_trait;
use serde::Deserialize;

use super::{Adapter, ChannelError, SendOutcome};
use crate::config::TelegramConfig;
use crate::db::models::Channel;
use crate::masking::mask_recipient;

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    result: Option<SendMessageResult>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendMessageResult {
    message_id: i64,
}

pub struct TelegramAdapter {
    client: reqwest::Client,
    bot_token: Option<String>,
}

impl TelegramAdapter {
    pub fn new(config: &TelegramConfig, timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client builds"),
            bot_token: config.bot_token.clone(),
        }
    }

    /// Escapes `_ * [ \`` per `spec.md` §4.4 so the subject can't break the
    /// surrounding Markdown emphasis markers.
    fn escape_subject(subject: &str) -> String {
        let mut escaped = String::with_capacity(subject.len());
        for ch in subject.chars() {
            if matches!(ch, '_' | '*' | '[' | '`') {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        escaped
    }
}

#[async_trait]
impl Adapter for TelegramAdapter {
    fn name(&self) -> Channel {
        Channel::Telegram
    }

    fn is_configured(&self) -> bool {
        self.bot_token.is_some()
    }

    async fn send(&self, recipient: &str, subject: Option<&str>, body: &str) -> SendOutcome {
        let masked = mask_recipient(Channel::Telegram, recipient);

        let token = self.bot_token.as_ref().ok_or_else(|| {
            tracing::warn!(recipient = %masked, "telegram adapter not configured");
            ChannelError::terminal("NOT_CONFIGURED", "Telegram bot token is not configured")
        })?;

        let text = match subject {
            Some(subject) if !subject.is_empty() => {
                format!("*{}*\n\n{}", Self::escape_subject(subject), body)
            }
            _ => body.to_string(),
        };

        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": recipient,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(recipient = %masked, error = %e, "telegram request failed");
                ChannelError::transient("API_ERROR", e.to_string())
            })?;

        let status = response.status();
        let parsed: Result<SendMessageResponse, _> = response.json().await;

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|r| r.description)
                .unwrap_or_else(|| format!("Telegram API error ({status})"));

            return if status.as_u16() == 429 || status.is_server_error() {
                Err(ChannelError::transient("API_ERROR", message))
            } else {
                Err(ChannelError::terminal("INVALID_RECIPIENT", message))
            };
        }

        let body = parsed.map_err(|e| ChannelError::transient("API_ERROR", e.to_string()))?;
        if !body.ok {
            let message = body.description.unwrap_or_else(|| "unknown Telegram error".to_string());
            return Err(ChannelError::transient("API_ERROR", message));
        }

        tracing::info!(recipient = %masked, "telegram message sent");
        Ok(body.result.map(|r| r.message_id.to_string()))
    }
}
