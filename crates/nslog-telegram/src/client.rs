//! Telegram Bot API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::error::DeliveryError;

/// Default Bot API host
pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Something that can deliver one text message to a remote chat
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Message markup mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParseMode {
    MarkdownV2,
    Markdown,
    #[default]
    #[serde(rename = "HTML")]
    Html,
}

/// Numeric chat id or `@channel` username
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Username(name) => f.write_str(name),
        }
    }
}

/// Client configuration
#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: ChatId,
    pub parse_mode: ParseMode,
    pub base_url: String,
    pub timeout: Duration,

    /// Extra `sendMessage` fields; these override the defaults
    pub send_message_options: Map<String, Value>,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: ChatId) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id,
            parse_mode: ParseMode::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            send_message_options: Map::new(),
        }
    }
}

/// Sends messages through `POST /bot<token>/sendMessage`
pub struct TelegramClient {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.base_url.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    /// JSON body for one message
    pub fn request_body(&self, text: &str) -> Value {
        let mut body = json!({
            "chat_id": self.config.chat_id,
            "parse_mode": self.config.parse_mode,
            "text": text,
            "disableWebPagePreview": true,
        });

        if let Value::Object(obj) = &mut body {
            for (key, value) in &self.config.send_message_options {
                obj.insert(key.clone(), value.clone());
            }
        }

        body
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        debug!(chat = %self.config.chat_id, len = text.len(), "sending telegram message");

        let response = self
            .http
            .post(self.endpoint())
            .json(&self.request_body(text))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(base_url: String) -> TelegramClient {
        let mut config = TelegramConfig::new("123:abc", ChatId::Id(-1001));
        config.base_url = base_url;
        TelegramClient::new(config).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let mut config = TelegramConfig::new("t", ChatId::Username("@ops".to_string()));
        config
            .send_message_options
            .insert("disable_notification".to_string(), json!(true));
        config
            .send_message_options
            .insert("parse_mode".to_string(), json!("MarkdownV2"));
        let client = TelegramClient::new(config).unwrap();

        assert_eq!(
            client.request_body("hi"),
            json!({
                "chat_id": "@ops",
                "parse_mode": "MarkdownV2",
                "text": "hi",
                "disableWebPagePreview": true,
                "disable_notification": true,
            })
        );
    }

    #[tokio::test]
    async fn test_send_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": -1001,
                "parse_mode": "HTML",
                "text": "hello",
            })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        client(server.url()).send("hello").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_status_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/bot123:abc/sendMessage")
            .with_status(429)
            .with_body(r#"{"ok":false,"description":"Too Many Requests"}"#)
            .create_async()
            .await;

        let err = client(server.url()).send("hello").await.unwrap_err();
        match err {
            DeliveryError::Status { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("Too Many Requests"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
