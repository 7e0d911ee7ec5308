use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use slotbook_core::dialogue::{Ack, Prompt};
use slotbook_core::domain::client::ChatId;
use slotbook_core::notifier::{DeliveryError, MessageSink};

use crate::events::Update;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("bot token was rejected: {0}")]
    Unauthorized(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 8, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait BotTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// Blocks until an update arrives. `None` means the stream closed.
    async fn next_update(&self) -> Result<Option<Update>, TransportError>;
    async fn send_message(&self, chat: ChatId, prompt: &Prompt) -> Result<(), TransportError>;
    async fn edit_message(&self, chat: ChatId, message_id: i64, prompt: &Prompt) -> Result<(), TransportError>;
    async fn answer_callback(&self, callback_id: &str, ack: Option<&Ack>) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl BotTransport for NoopTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<Update>, TransportError> {
        Ok(None)
    }

    async fn send_message(&self, _chat: ChatId, _prompt: &Prompt) -> Result<(), TransportError> {
        Ok(())
    }

    async fn edit_message(&self, _chat: ChatId, _message_id: i64, _prompt: &Prompt) -> Result<(), TransportError> {
        Ok(())
    }

    async fn answer_callback(&self, _callback_id: &str, _ack: Option<&Ack>) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Delivers admin notifications as plain messages over the bot transport.
pub struct TransportMessageSink {
    transport: Arc<dyn BotTransport>,
}

impl TransportMessageSink {
    pub fn new(transport: Arc<dyn BotTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl MessageSink for TransportMessageSink {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), DeliveryError> {
        self.transport
            .send_message(chat, &Prompt::text(text))
            .await
            .map_err(|error| DeliveryError { chat_id: chat.0, message: error.to_string() })
    }
}
