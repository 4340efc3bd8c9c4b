//! Channel Router (`spec.md` §4.5): an immutable registry over adapters plus
//! fallback-chain orchestration. Built once at startup, matching the
//! "adapter registry: read-only after startup" design note in §5.

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::channels::{Adapter, ChannelError};
use crate::db::models::Channel;
use crate::db::repository::ChannelConfigRepository;

#[derive(Debug, Clone)]
pub struct SendResult {
    pub ok: bool,
    pub provider_message_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub retryable: bool,
    pub used_channel: Option<Channel>,
}

impl SendResult {
    fn success(provider_message_id: Option<String>, used_channel: Option<Channel>) -> Self {
        Self {
            ok: true,
            provider_message_id,
            error_code: None,
            error_message: None,
            retryable: false,
            used_channel,
        }
    }

    fn failure(err: ChannelError, used_channel: Option<Channel>) -> Self {
        Self {
            ok: false,
            provider_message_id: None,
            error_code: Some(err.code),
            error_message: Some(err.message),
            retryable: err.retryable,
            used_channel,
        }
    }
}

pub struct Router {
    adapters: HashMap<Channel, Box<dyn Adapter>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelAvailability {
    Available,
    Disabled,
    DailyLimitExceeded,
}

/// Default fallback map consulted when the caller does not override it
/// (`spec.md` §4.5): EMAIL<->SMS, TELEGRAM->EMAIL, WHATSAPP->TELEGRAM.
pub fn default_fallback(channel: Channel) -> Option<Channel> {
    match channel {
        Channel::Email => Some(Channel::Sms),
        Channel::Sms => Some(Channel::Email),
        Channel::Telegram => Some(Channel::Email),
        Channel::Whatsapp => Some(Channel::Telegram),
    }
}

impl Router {
    pub fn new(adapters: HashMap<Channel, Box<dyn Adapter>>) -> Self {
        Self { adapters }
    }

    /// `spec.md` §4.4 treats "disabled" and "over its daily cap" as distinct
    /// terminal error codes, so this can't collapse to a single bool.
    async fn channel_availability(pool: &SqlitePool, channel: Channel) -> ChannelAvailability {
        match ChannelConfigRepository::find(pool, channel.as_str()).await {
            Ok(Some(cfg)) if !cfg.enabled => ChannelAvailability::Disabled,
            Ok(Some(cfg)) if cfg.daily_limit_exceeded() => ChannelAvailability::DailyLimitExceeded,
            Ok(Some(_)) => ChannelAvailability::Available,
            Ok(None) => ChannelAvailability::Available,
            Err(_) => ChannelAvailability::Available,
        }
    }

    async fn send_one(
        &self,
        pool: &SqlitePool,
        channel: Channel,
        recipient: &str,
        subject: Option<&str>,
        body: &str,
    ) -> SendResult {
        let adapter = match self.adapters.get(&channel) {
            Some(a) => a,
            None => {
                return SendResult::failure(
                    ChannelError::terminal("UNKNOWN_CHANNEL", "no adapter registered"),
                    None,
                )
            }
        };

        match Self::channel_availability(pool, channel).await {
            ChannelAvailability::Available => {}
            ChannelAvailability::Disabled => {
                return SendResult::failure(
                    ChannelError::terminal("CHANNEL_DISABLED", "channel is disabled"),
                    Some(channel),
                );
            }
            ChannelAvailability::DailyLimitExceeded => {
                return SendResult::failure(
                    ChannelError::terminal("DAILY_LIMIT_EXCEEDED", "channel has reached its daily send limit"),
                    Some(channel),
                );
            }
        }

        match adapter.send(recipient, subject, body).await {
            Ok(provider_message_id) => {
                if let Ok(Some(_)) = ChannelConfigRepository::find(pool, channel.as_str()).await {
                    let _ = ChannelConfigRepository::increment_daily_sent(pool, channel.as_str()).await;
                }
                SendResult::success(provider_message_id, Some(channel))
            }
            Err(err) => SendResult::failure(err, Some(channel)),
        }
    }

    /// `spec.md` §4.5: unknown channel / disabled adapter / adapter error
    /// all propagate into a `SendResult`.
    pub async fn send(
        &self,
        pool: &SqlitePool,
        channel: Channel,
        recipient: &str,
        subject: Option<&str>,
        body: &str,
    ) -> SendResult {
        self.send_one(pool, channel, recipient, subject, body).await
    }

    /// Attempts `primary`; the fallback is only attempted when the primary's
    /// failure is retryable — a terminal validation error on the primary
    /// never cascades to the fallback (`spec.md` §4.5, resolved Open
    /// Question in DESIGN.md).
    pub async fn send_with_fallback(
        &self,
        pool: &SqlitePool,
        primary: Channel,
        fallback: Option<Channel>,
        recipient: &str,
        subject: Option<&str>,
        body: &str,
    ) -> SendResult {
        let primary_result = self.send_one(pool, primary, recipient, subject, body).await;
        if primary_result.ok || !primary_result.retryable {
            return primary_result;
        }

        let fallback = match fallback {
            Some(f) if f != primary => f,
            _ => return primary_result,
        };

        self.send_one(pool, fallback, recipient, subject, body).await
    }

    pub async fn health_check_all(&self) -> HashMap<Channel, bool> {
        let mut results = HashMap::new();
        for (channel, adapter) in self.adapters.iter() {
            // WhatsApp is a declared placeholder and is excluded from health
            // rollups (§9 Open Questions resolution).
            if *channel == Channel::Whatsapp {
                continue;
            }
            results.insert(*channel, adapter.health_check().await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fallback_map_matches_spec() {
        assert_eq!(default_fallback(Channel::Email), Some(Channel::Sms));
        assert_eq!(default_fallback(Channel::Sms), Some(Channel::Email));
        assert_eq!(default_fallback(Channel::Telegram), Some(Channel::Email));
        assert_eq!(default_fallback(Channel::Whatsapp), Some(Channel::Telegram));
    }
}
