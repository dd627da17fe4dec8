use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::TelegramConfig;
use crate::error::{Error, Result};

use super::{ApiResponse, BotCommand, Update, User};

/// Bot API rejects messages over 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4000;

/// Thin Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
    api_base: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        // Long polls hold the request open for `poll_timeout_secs`.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs.saturating_add(15)))
            .build()?;
        Ok(Self {
            client,
            token: config.token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T> {
        let resp = self.client.post(self.url(method)).json(body).send().await?;
        let status = resp.status();
        let reply: ApiResponse<T> = resp.json().await.map_err(|e| {
            if status.is_success() {
                Error::Http(e)
            } else {
                Error::TelegramApi(format!("{method} returned {status}"))
            }
        })?;

        if !reply.ok {
            let reason = reply.description.unwrap_or_else(|| status.to_string());
            return Err(Error::TelegramApi(format!("{method} failed: {reason}")));
        }
        reply
            .result
            .ok_or_else(|| Error::TelegramApi(format!("{method} returned no result")))
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &json!({})).await
    }

    /// Send `text` to `chat_id`, split into several messages if it is too long.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text) {
            let body = json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            let _: Value = self.call("sendMessage", &body).await?;
        }
        Ok(())
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        let updates: Vec<Update> = self.call("getUpdates", &body).await?;
        debug!("getUpdates returned {} updates", updates.len());
        Ok(updates)
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let _: Value = self
            .call("setMyCommands", &json!({ "commands": commands }))
            .await?;
        Ok(())
    }
}

fn split_message(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(MAX_MESSAGE_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            token: "123:abc".into(),
            chat_id: 42,
            api_base: server.uri(),
            poll_timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn long_text_is_split() {
        let text = "x".repeat(MAX_MESSAGE_CHARS * 2 + 5);
        let parts = split_message(&text);

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 5);
    }

    #[test]
    fn huge_poll_timeout_still_builds_client() {
        let client = TelegramClient::new(&TelegramConfig {
            token: "123:abc".into(),
            chat_id: 42,
            api_base: "https://api.telegram.org".into(),
            poll_timeout_secs: u64::MAX,
        });
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn get_me_returns_bot_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"id": 7, "is_bot": true, "first_name": "ups", "username": "ups_bot"}
            })))
            .mount(&server)
            .await;

        let me = client_for(&server).get_me().await.unwrap();

        assert_eq!(me.id, 7);
        assert_eq!(me.username.as_deref(), Some("ups_bot"));
    }

    #[tokio::test]
    async fn send_message_posts_chat_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(json!({"chat_id": 42, "text": "nut/a: OB"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 1, "chat": {"id": 42}, "text": "nut/a: OB"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .send_message(42, "nut/a: OB")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn api_error_is_reported_with_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_message(1, "hello")
            .await
            .unwrap_err();

        match err {
            Error::TelegramApi(msg) => assert!(msg.contains("chat not found")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn get_updates_parses_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .and(body_partial_json(json!({"offset": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {"update_id": 10, "message": {"message_id": 3, "chat": {"id": 42}, "text": "/status"}},
                    {"update_id": 11}
                ]
            })))
            .mount(&server)
            .await;

        let updates = client_for(&server).get_updates(Some(10), 0).await.unwrap();

        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.text.as_deref(), Some("/status"));
        assert!(updates[1].message.is_none());
    }

    #[tokio::test]
    async fn set_my_commands_sends_menu() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/setMyCommands"))
            .and(body_partial_json(json!({
                "commands": [{"command": "status", "description": "list ups states"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let commands = [BotCommand {
            command: "status".into(),
            description: "list ups states".into(),
        }];
        client_for(&server).set_my_commands(&commands).await.unwrap();
    }
}
