#![allow(unused_imports)]

//! Database models split into separate files.
//! This module re-exports individual model modules so `use crate::db::models::*;`
//! reaches every row type from one place.

pub mod api_client;
pub mod audit_log;
pub mod channel_config;
pub mod message_template;
pub mod notification;

pub use self::api_client::*;
pub use self::audit_log::*;
pub use self::channel_config::*;
pub use self::message_template::*;
pub use self::notification::*;
