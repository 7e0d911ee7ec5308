//! Bot API client over HTTPS long polling.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use slotbook_core::config::BotConfig;
use slotbook_core::dialogue::{Ack, Prompt};
use slotbook_core::domain::client::ChatId;

use crate::events::{CallbackQuery, IncomingMessage, Sender, Update, UpdateKind};
use crate::keyboard::{inline_markup, reply_markup};
use crate::transport::{BotTransport, TransportError};

const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];
const REQUEST_GRACE_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    message_id: i64,
    chat: WireChat,
    from: Option<WireUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCallback {
    id: String,
    from: WireUser,
    message: Option<WireMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUpdate {
    update_id: i64,
    message: Option<WireMessage>,
    callback_query: Option<WireCallback>,
}

impl From<WireUser> for Sender {
    fn from(user: WireUser) -> Self {
        Self { id: user.id, username: user.username }
    }
}

impl WireUpdate {
    fn into_update(self) -> Update {
        let kind = match (self.message, self.callback_query) {
            (Some(WireMessage { chat, from: Some(from), text: Some(text), .. }), _) => {
                UpdateKind::Message(IncomingMessage { chat_id: chat.id, from: from.into(), text })
            }
            (Some(_), _) => UpdateKind::Unsupported { kind: "message_without_text".to_owned() },
            (None, Some(WireCallback { id, from, message: Some(message), data: Some(data) })) => {
                UpdateKind::Callback(CallbackQuery {
                    id,
                    chat_id: message.chat.id,
                    message_id: message.message_id,
                    from: from.into(),
                    data,
                })
            }
            (None, Some(_)) => UpdateKind::Unsupported { kind: "callback_without_message".to_owned() },
            (None, None) => UpdateKind::Unsupported { kind: "other".to_owned() },
        };
        Update { update_id: self.update_id, kind }
    }
}

#[derive(Debug, Deserialize)]
struct BotIdentity {
    id: i64,
    username: Option<String>,
}

pub struct TelegramTransport {
    client: Client,
    api_base_url: String,
    token: SecretString,
    poll_timeout_secs: u64,
    offset: Mutex<i64>,
    pending: Mutex<VecDeque<Update>>,
}

impl TelegramTransport {
    pub fn new(
        api_base_url: impl Into<String>,
        token: SecretString,
        poll_timeout_secs: u64,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + REQUEST_GRACE_SECS))
            .build()
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.into(),
            token,
            poll_timeout_secs,
            offset: Mutex::new(0),
            pending: Mutex::new(VecDeque::new()),
        })
    }

    pub fn from_config(config: &BotConfig) -> Result<Self, TransportError> {
        Self::new(config.api_base_url.clone(), config.token.clone(), config.poll_timeout_secs)
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url.trim_end_matches('/'), self.token.expose_secret())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        failure: fn(String) -> TransportError,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| failure(format!("{method}: {}", error.without_url())))?;

        let status = response.status();
        let payload: ApiResponse<T> = response
            .json()
            .await
            .map_err(|error| failure(format!("{method}: unreadable response ({status}): {}", error.without_url())))?;

        if payload.ok {
            if let Some(result) = payload.result {
                return Ok(result);
            }
        }

        let description = payload.description.unwrap_or_else(|| "unknown Bot API error".to_owned());
        match payload.error_code {
            Some(401) | Some(404) => Err(TransportError::Unauthorized(format!("{method}: {description}"))),
            code => Err(failure(format!("{method} (code={}): {description}", code.unwrap_or_default()))),
        }
    }
}

fn is_not_modified(error: &TransportError) -> bool {
    matches!(error, TransportError::Send(message) if message.contains("message is not modified"))
}

#[async_trait]
impl BotTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let identity: BotIdentity = self.call("getMe", &json!({}), TransportError::Connect).await?;
        info!(
            event_name = "telegram.connected",
            bot_id = identity.id,
            bot_username = identity.username.as_deref().unwrap_or("unknown"),
            "bot token accepted"
        );
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<Update>, TransportError> {
        loop {
            if let Some(update) = self.pending.lock().await.pop_front() {
                return Ok(Some(update));
            }

            let mut offset = self.offset.lock().await;
            let body = json!({
                "offset": *offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ALLOWED_UPDATES,
            });
            let updates: Vec<WireUpdate> = self.call("getUpdates", &body, TransportError::Receive).await?;
            debug!(event_name = "telegram.polled", count = updates.len(), offset = *offset, "long poll returned");

            let mut pending = self.pending.lock().await;
            for update in updates {
                *offset = (*offset).max(update.update_id + 1);
                pending.push_back(update.into_update());
            }
        }
    }

    async fn send_message(&self, chat: ChatId, prompt: &Prompt) -> Result<(), TransportError> {
        let mut body = json!({ "chat_id": chat.0, "text": prompt.text });
        if let Some(markup) = reply_markup(&prompt.menu) {
            body["reply_markup"] = json!(markup);
        }
        let _: Value = self.call("sendMessage", &body, TransportError::Send).await?;
        Ok(())
    }

    async fn edit_message(&self, chat: ChatId, message_id: i64, prompt: &Prompt) -> Result<(), TransportError> {
        let mut body = json!({ "chat_id": chat.0, "message_id": message_id, "text": prompt.text });
        if let Some(markup) = inline_markup(&prompt.menu) {
            body["reply_markup"] = json!(markup);
        }
        match self.call::<Value>("editMessageText", &body, TransportError::Send).await {
            Ok(_) => Ok(()),
            Err(error) if is_not_modified(&error) => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn answer_callback(&self, callback_id: &str, ack: Option<&Ack>) -> Result<(), TransportError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(ack) = ack {
            body["text"] = json!(ack.text);
            body["show_alert"] = json!(ack.alert);
        }
        let _: bool = self.call("answerCallbackQuery", &body, TransportError::Send).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.pending.lock().await.clear();
        Ok(())
    }
}
