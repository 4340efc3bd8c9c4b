use async_trait::async_trait;

use super::{Adapter, ChannelError, SendOutcome};
use crate::config::WhatsAppConfig;
use crate::db::models::Channel;

/// Placeholder adapter (`spec.md` §4.4, §9 Open Questions): the surface is
/// present and registered, but it always reports `is_configured() == false`
/// and fails every send until real credentials exist.
pub struct WhatsAppAdapter {
    #[allow(dead_code)]
    config: WhatsAppConfig,
}

impl WhatsAppAdapter {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl Adapter for WhatsAppAdapter {
    fn name(&self) -> Channel {
        Channel::Whatsapp
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn send(&self, _recipient: &str, _subject: Option<&str>, _body: &str) -> SendOutcome {
        Err(ChannelError::terminal(
            "NOT_CONFIGURED",
            "WhatsApp Business integration is not configured",
        ))
    }

    async fn health_check(&self) -> bool {
        false
    }
}
