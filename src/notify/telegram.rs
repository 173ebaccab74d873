//! Telegram Bot API notifier.
//!
//! Messages are delivered with `POST {api_base}/bot{token}/sendMessage` and a
//! JSON body carrying the chat id, the text and the Markdown parse mode.

use crate::config::TelegramConfig;
use crate::error::SendError;
use crate::notify::Notifier;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Sends messages to a single Telegram chat.
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Create a notifier with a pre-configured HTTP client.
    pub fn new(config: &TelegramConfig) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", config.api_base, config.bot_token),
            chat_id: config.chat_id.clone(),
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), SendError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Messaging API rejected notification");
            return Err(SendError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }
}

// The bot token is part of the endpoint; keep it out of debug output.
impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}
