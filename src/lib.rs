//! Relays UPS status reports from an MQTT bus to a Telegram chat.

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod mqtt;
pub mod telegram;
pub mod ups;

pub use error::{Error, Result};
