use async_trait::async_trait;

use super::{Adapter, ChannelError, SendOutcome};
use crate::config::SmsConfig;
use crate::db::models::Channel;
use crate::masking::mask_recipient;

pub struct SmsAdapter {
    client: reqwest::Client,
    api_url: Option<String>,
    api_key: Option<String>,
    sender: Option<String>,
}

impl SmsAdapter {
    pub fn new(config: &SmsConfig, timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client builds"),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            sender: config.sender.clone(),
        }
    }

    /// Keeps a leading `+`, strips all other non-digit characters, and maps
    /// an 11-digit `8XXXXXXXXXX` number onto `+7XXXXXXXXXX` (`spec.md` §4.4).
    fn normalize_e164(recipient: &str) -> String {
        let has_plus = recipient.trim().starts_with('+');
        let digits: String = recipient.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.len() == 11 && digits.starts_with('8') {
            return format!("+7{}", &digits[1..]);
        }

        if has_plus {
            format!("+{digits}")
        } else {
            digits
        }
    }
}

#[async_trait]
impl Adapter for SmsAdapter {
    fn name(&self) -> Channel {
        Channel::Sms
    }

    fn is_configured(&self) -> bool {
        self.api_url.is_some() && self.api_key.is_some()
    }

    async fn send(&self, recipient: &str, _subject: Option<&str>, body: &str) -> SendOutcome {
        let masked = mask_recipient(Channel::Sms, recipient);

        let (url, key) = match (&self.api_url, &self.api_key) {
            (Some(u), Some(k)) => (u, k),
            _ => {
                tracing::warn!(recipient = %masked, "sms adapter not configured");
                return Err(ChannelError::terminal(
                    "NOT_CONFIGURED",
                    "SMS gateway is not configured",
                ));
            }
        };

        let to = Self::normalize_e164(recipient);
        let from = self.sender.clone().unwrap_or_default();

        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(recipient = %masked, error = %e, "sms request failed");
                ChannelError::transient("API_ERROR", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = format!("SMS gateway error ({status}): {error_text}");

            return if status.as_u16() == 400 {
                Err(ChannelError::terminal("INVALID_RECIPIENT", message))
            } else {
                Err(ChannelError::transient("API_ERROR", message))
            };
        }

        let payload: serde_json::Value = response.json().await.unwrap_or_default();
        let provider_id = payload
            .get("sid")
            .or_else(|| payload.get("id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        tracing::info!(recipient = %masked, "sms sent");
        Ok(provider_id)
    }
}
