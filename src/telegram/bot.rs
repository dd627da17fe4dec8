use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::ChatCommand;
use super::client::TelegramClient;

/// Deliver queued messages to the chat until every `ChatSender` is dropped and
/// the queue is empty. Failed sends are logged and dropped.
pub fn spawn_sender(
    client: TelegramClient,
    chat_id: i64,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(e) = client.send_message(chat_id, &text).await {
                error!("Failed to send Telegram message: {}", e);
            }
        }
        info!("Telegram sender drained");
    })
}

/// Long-polls `getUpdates` and forwards slash commands from the configured chat.
pub struct CommandPoller {
    client: TelegramClient,
    chat_id: i64,
    timeout_secs: u64,
}

impl CommandPoller {
    pub fn new(client: TelegramClient, chat_id: i64, timeout_secs: u64) -> Self {
        Self {
            client,
            chat_id,
            timeout_secs,
        }
    }

    pub async fn run(self, command_tx: mpsc::Sender<ChatCommand>) {
        info!("Starting Telegram long polling (chat {})", self.chat_id);

        let mut offset: Option<i64> = None;
        let mut backoff = Duration::from_secs(1);
        let max_backoff = Duration::from_secs(60);

        loop {
            match self.client.get_updates(offset, self.timeout_secs).await {
                Ok(updates) => {
                    backoff = Duration::from_secs(1);

                    for update in updates {
                        offset = Some(update.update_id + 1);

                        let Some(message) = update.message else {
                            continue;
                        };
                        if message.chat.id != self.chat_id {
                            warn!("Ignoring message from unknown chat {}", message.chat.id);
                            continue;
                        }
                        let Some(command) = message.text.as_deref().and_then(parse_command) else {
                            debug!("Ignoring non-command message");
                            continue;
                        };
                        if command_tx.send(command).await.is_err() {
                            warn!("Command channel closed");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("Telegram polling error: {}. Retrying in {:?}", e, backoff);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                }
            }
        }
    }
}

/// Parse "/status@ups_bot furnace" into name "status", argument "furnace".
pub fn parse_command(text: &str) -> Option<ChatCommand> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, argument) = match rest.split_once(char::is_whitespace) {
        Some((head, argument)) => (head, argument.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some(ChatCommand {
        name: name.to_ascii_lowercase(),
        argument: argument.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::TelegramConfig;

    fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            token: "t".into(),
            chat_id: 42,
            api_base: server.uri(),
            poll_timeout_secs: 0,
        })
        .unwrap()
    }

    #[test]
    fn parses_plain_command() {
        assert_eq!(
            parse_command("/status"),
            Some(ChatCommand {
                name: "status".into(),
                argument: String::new(),
            })
        );
    }

    #[test]
    fn strips_bot_suffix_and_keeps_argument() {
        let cmd = parse_command("/Status@ups_bot  furnace ").unwrap();
        assert_eq!(cmd.name, "status");
        assert_eq!(cmd.argument, "furnace");
    }

    #[test]
    fn rejects_non_commands() {
        assert_eq!(parse_command("status"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command("/@ups_bot"), None);
    }

    #[tokio::test]
    async fn sender_flushes_queue_before_exiting() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bott/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 1, "chat": {"id": 42}}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_sender(client_for(&server), 42, rx);
        tx.send("nut/a: OL".to_string()).unwrap();
        tx.send("nut/a: OB".to_string()).unwrap();
        drop(tx);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn sender_survives_failed_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bott/sendMessage"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_sender(client_for(&server), 42, rx);
        tx.send("first".to_string()).unwrap();
        tx.send("second".to_string()).unwrap();
        drop(tx);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn poller_forwards_commands_from_configured_chat_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bott/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {"update_id": 1, "message": {"chat": {"id": 99}, "text": "/status"}},
                    {"update_id": 2, "message": {"chat": {"id": 42}, "text": "hello"}},
                    {"update_id": 3, "message": {"chat": {"id": 42}, "text": "/help"}}
                ]
            })))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::channel(4);
        let poller = CommandPoller::new(client_for(&server), 42, 0);
        let handle = tokio::spawn(poller.run(tx));

        let cmd = rx.recv().await.unwrap();
        handle.abort();

        assert_eq!(cmd.name, "help");
    }
}
