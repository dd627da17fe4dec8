use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub telegram: TelegramConfig,
    /// How often the tracked devices are summarised in the log. Zero disables it.
    pub summary_log_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    pub client_id: String,
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: i64,
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

// The token grants full control of the bot, keep it out of logs.
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

fn env_required(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let chat_id = env_required("TELEGRAM_CHAT_ID")?;
        let chat_id = chat_id
            .trim()
            .parse::<i64>()
            .map_err(|e| Error::Config(format!("TELEGRAM_CHAT_ID is not a chat id: {e}")))?;

        let config = Self {
            mqtt: MqttConfig {
                broker_host: env_required("MQTT_BROKER_HOST")?,
                broker_port: env_or_default("MQTT_BROKER_PORT", 1883),
                username: env_optional("MQTT_USERNAME"),
                password: env_optional("MQTT_PASSWORD"),
                topic_prefix: normalize_prefix(&env_or_default(
                    "MQTT_TOPIC_PREFIX",
                    "nut".to_string(),
                )),
                client_id: env_or_default("MQTT_CLIENT_ID", "nut-to-telegram".to_string()),
            },
            telegram: TelegramConfig {
                token: env_required("TELEGRAM_TOKEN")?,
                chat_id,
                api_base: env_or_default(
                    "TELEGRAM_API_BASE",
                    "https://api.telegram.org".to_string(),
                ),
                poll_timeout_secs: env_or_default("TELEGRAM_POLL_TIMEOUT_SECS", 30),
            },
            summary_log_interval_secs: env_or_default("SUMMARY_LOG_INTERVAL_SECS", 300),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.mqtt.broker_host.is_empty() {
            return Err(Error::Config("MQTT_BROKER_HOST must not be empty".into()));
        }
        if self.mqtt.topic_prefix.is_empty() {
            return Err(Error::Config("MQTT_TOPIC_PREFIX must not be empty".into()));
        }
        if self.telegram.token.is_empty() {
            return Err(Error::Config("TELEGRAM_TOKEN must not be empty".into()));
        }
        if !self.telegram.api_base.starts_with("http") {
            return Err(Error::Config(format!(
                "TELEGRAM_API_BASE must be an http(s) URL, got {}",
                self.telegram.api_base
            )));
        }
        Ok(())
    }

    /// Wildcard filter covering every device under the prefix.
    pub fn subscription_topic(&self) -> String {
        format!("{}/#", self.mqtt.topic_prefix)
    }

    pub fn summary_log_interval(&self) -> Option<Duration> {
        (self.summary_log_interval_secs > 0)
            .then(|| Duration::from_secs(self.summary_log_interval_secs))
    }
}

/// "nut/" → "nut", so the subscription never ends up as "nut//#".
fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            mqtt: MqttConfig {
                broker_host: "localhost".into(),
                broker_port: 1883,
                username: None,
                password: None,
                topic_prefix: "nut".into(),
                client_id: "nut-to-telegram".into(),
            },
            telegram: TelegramConfig {
                token: "123:abc".into(),
                chat_id: 42,
                api_base: "https://api.telegram.org".into(),
                poll_timeout_secs: 30,
            },
            summary_log_interval_secs: 300,
        }
    }

    #[test]
    fn trailing_slashes_are_trimmed_from_prefix() {
        assert_eq!(normalize_prefix("nut/"), "nut");
        assert_eq!(normalize_prefix(" home/ups// "), "home/ups");
        assert_eq!(normalize_prefix("nut"), "nut");
    }

    #[test]
    fn subscription_covers_whole_prefix() {
        assert_eq!(sample().subscription_topic(), "nut/#");
    }

    #[test]
    fn zero_interval_disables_summary() {
        let mut config = sample();
        assert_eq!(config.summary_log_interval(), Some(Duration::from_secs(300)));
        config.summary_log_interval_secs = 0;
        assert_eq!(config.summary_log_interval(), None);
    }

    #[test]
    fn validate_rejects_empty_prefix() {
        let mut config = sample();
        config.mqtt.topic_prefix = String::new();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_non_http_api_base() {
        let mut config = sample();
        config.telegram.api_base = "api.telegram.org".into();
        assert!(config.validate().is_err());
        config.telegram.api_base = "http://127.0.0.1:8081".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_output_hides_token() {
        let rendered = format!("{:?}", sample().telegram);
        assert!(!rendered.contains("123:abc"));
        assert!(rendered.contains("chat_id: 42"));
    }
}
