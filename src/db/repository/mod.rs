pub mod api_client_repository;
pub mod audit_log_repository;
pub mod channel_config_repository;
pub mod message_template_repository;
pub mod notification_repository;

pub use api_client_repository::ApiClientRepository;
pub use audit_log_repository::AuditLogRepository;
pub use channel_config_repository::ChannelConfigRepository;
pub use message_template_repository::MessageTemplateRepository;
pub use notification_repository::NotificationRepository;
