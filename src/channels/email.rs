use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Adapter, ChannelError, SendOutcome};
use crate::config::SmtpConfig;
use crate::db::models::Channel;
use crate::masking::mask_recipient;

const HTML_SENTINELS: [&str; 4] = ["<!doctype", "<html", "<p>", "<div"];
const HTML_SENTINEL_BR: &str = "<br";

pub struct EmailAdapter {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: Option<String>,
}

impl EmailAdapter {
    pub fn new(config: &SmtpConfig) -> Self {
        let transport = (|| {
            let host = config.host.as_ref()?;
            let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .port(config.port);

            let builder = match (&config.username, &config.password) {
                (Some(user), Some(pass)) => {
                    builder.credentials(Credentials::new(user.clone(), pass.clone()))
                }
                _ => builder,
            };

            Some(builder.build())
        })();

        Self {
            transport,
            from_address: config.from_address.clone(),
        }
    }

    fn looks_like_html(body: &str) -> bool {
        let lower = body.to_ascii_lowercase();
        HTML_SENTINELS.iter().any(|s| lower.contains(s)) || lower.contains(HTML_SENTINEL_BR)
    }

    /// Terminal for address-invalid refusals (`5.1.x`/"user unknown"-style
    /// responses); transient for everything else (connection drops,
    /// greylisting, `4xx` responses).
    fn classify(err: &lettre::transport::smtp::Error) -> ChannelError {
        let message = err.to_string();
        let lower = message.to_ascii_lowercase();
        let address_invalid = lower.contains("mailbox")
            || lower.contains("user unknown")
            || lower.contains("no such user")
            || lower.contains("5.1.");

        if address_invalid {
            ChannelError::terminal("INVALID_RECIPIENT", message)
        } else {
            ChannelError::transient("SMTP_ERROR", message)
        }
    }
}

#[async_trait]
impl Adapter for EmailAdapter {
    fn name(&self) -> Channel {
        Channel::Email
    }

    fn is_configured(&self) -> bool {
        self.transport.is_some() && self.from_address.is_some()
    }

    async fn send(&self, recipient: &str, subject: Option<&str>, body: &str) -> SendOutcome {
        let masked = mask_recipient(Channel::Email, recipient);

        let (transport, from) = match (&self.transport, &self.from_address) {
            (Some(t), Some(f)) => (t, f),
            _ => {
                tracing::warn!(recipient = %masked, "email adapter not configured");
                return Err(ChannelError::terminal(
                    "NOT_CONFIGURED",
                    "SMTP transport is not configured",
                ));
            }
        };

        let subject = subject.unwrap_or("Notification");
        let content_type = if Self::looks_like_html(body) {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        let message = Message::builder()
            .from(from.parse().map_err(|e| {
                ChannelError::terminal("INVALID_RECIPIENT", format!("invalid from address: {e}"))
            })?)
            .to(recipient.parse().map_err(|e| {
                ChannelError::terminal("INVALID_RECIPIENT", format!("invalid recipient: {e}"))
            })?)
            .subject(subject)
            .header(content_type)
            .body(body.to_string())
            .map_err(|e| ChannelError::terminal("INVALID_RECIPIENT", e.to_string()))?;

        match transport.send(message).await {
            Ok(response) => {
                tracing::info!(recipient = %masked, "email sent");
                Ok(response.message().next().map(|s| s.to_string()))
            }
            Err(e) => {
                let classified = Self::classify(&e);
                tracing::warn!(recipient = %masked, error = %classified.message, "email send failed");
                Err(classified)
            }
        }
    }
}
