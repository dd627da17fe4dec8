use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("mqtt error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("mqtt connection error: {0}")]
    MqttConnection(#[from] rumqttc::ConnectionError),

    #[error("no answer from mqtt broker within {0:?}")]
    MqttTimeout(std::time::Duration),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API answered, but with `"ok": false` or a non-success status.
    #[error("telegram api error: {0}")]
    TelegramApi(String),

    #[error("failed to register handler for signal {signal}: {source}")]
    Signal {
        signal: i32,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
