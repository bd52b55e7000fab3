// Alert delivery collaborators
use async_trait::async_trait;
use serde::Serialize;
use shared::models::SignalEvent;
use shared::utils::round_to;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{EngineError, Result};

/// Receives one call per emitted transition plus free-form lifecycle notices.
/// Callers treat failures as non-fatal.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, event: &SignalEvent) -> Result<()>;
    async fn notify(&self, text: &str) -> Result<()>;
}

pub fn format_signal(event: &SignalEvent) -> String {
    let mut msg = format!(
        "{} SIGNAL\nSymbol: {}\nPrice: {}\nStrength: {}/100\nMode: {}\nTime: {} UTC",
        event.direction,
        event.symbol,
        round_to(event.entry_price, 6),
        event.strength,
        event.mode,
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
    );
    if let Some(risk) = event.risk {
        msg.push_str(&format!(
            "\nSL: {}\nTP: {}",
            round_to(risk.stop_loss, 6),
            round_to(risk.take_profit, 6)
        ));
    }
    msg
}

/// Writes alerts to the tracing output only. Used when no chat credentials
/// are configured or in dry-run mode.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn deliver(&self, event: &SignalEvent) -> Result<()> {
        info!(
            id = %event.id,
            symbol = %event.symbol,
            direction = %event.direction,
            mode = %event.mode,
            price = event.entry_price,
            strength = event.strength,
            "Signal (log only)"
        );
        Ok(())
    }

    async fn notify(&self, text: &str) -> Result<()> {
        info!(notice = %text, "Notice (log only)");
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Posts plain-text messages to a Telegram bot chat.
pub struct TelegramAlertSink {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
    // Pause after each message to stay under the chat rate limit.
    pause: Duration,
}

impl TelegramAlertSink {
    pub fn new(token: &str, chat_id: &str, timeout: Duration, pause: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: "https://api.telegram.org".to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            pause,
        })
    }

    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let response = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await
            .map_err(|e| EngineError::AlertDelivery(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::AlertDelivery(format!("status {}: {}", status.as_u16(), body)));
        }
        debug!(status = status.as_u16(), "Telegram message sent");

        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramAlertSink {
    async fn deliver(&self, event: &SignalEvent) -> Result<()> {
        self.send(&format_signal(event)).await
    }

    async fn notify(&self, text: &str) -> Result<()> {
        self.send(text).await
    }
}
