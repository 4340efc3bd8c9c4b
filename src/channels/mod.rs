//! Channel Adapter: a uniform contract over the four provider integrations
//! (`spec.md` §4.4). Each adapter is constructed once at startup with its
//! own credentials (never via global mutable state, per the §9 design
//! note) and registered into the immutable map `router::Router` holds.

pub mod email;
pub mod sms;
pub mod telegram;
pub mod whatsapp;

use async_trait::async_trait;

use crate::db::models::Channel;

/// A terminal or transient failure returned by an adapter. `retryable`
/// drives the Dispatcher's state-machine transition (`spec.md` §4.6).
#[derive(Debug, Clone)]
pub struct ChannelError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ChannelError {
    pub fn terminal(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn transient(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            retryable: true,
        }
    }
}

pub type SendOutcome = Result<Option<String>, ChannelError>;

#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> Channel;

    /// Whether credentials were supplied at construction time.
    fn is_configured(&self) -> bool;

    async fn send(&self, recipient: &str, subject: Option<&str>, body: &str) -> SendOutcome;

    /// A cheap liveness probe; adapters without one report their
    /// configuredness as health.
    async fn health_check(&self) -> bool {
        self.is_configured()
    }
}
