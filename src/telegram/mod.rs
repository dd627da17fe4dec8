pub mod bot;
pub mod client;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// A slash command received from the configured chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCommand {
    /// Command name without the leading slash or `@botname` suffix.
    pub name: String,
    /// Whatever followed the command, trimmed. Empty when there was nothing.
    pub argument: String,
}

/// Outbound side of the chat. Sends are queued and delivered by the sender
/// task; the caller never waits on the network.
#[derive(Debug, Clone)]
pub struct ChatSender {
    tx: mpsc::UnboundedSender<String>,
}

impl ChatSender {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    pub fn send(&self, text: impl Into<String>) {
        if self.tx.send(text.into()).is_err() {
            warn!("Chat sender closed, dropping message");
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Entry of the command menu published with `setMyCommands`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}
