use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::client::ChatId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("delivery to chat {chat_id} failed: {message}")]
pub struct DeliveryError {
    pub chat_id: i64,
    pub message: String,
}

/// Outbound plain-text channel used for staff notifications.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingEvent {
    Created {
        master_name: String,
        date: String,
        time: String,
        package_name: String,
        price: Decimal,
        client_name: String,
        phone: String,
        handle: String,
    },
    Cancelled {
        master_name: String,
        date: String,
        time: String,
        handle: String,
    },
}

impl BookingEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::Created { master_name, date, time, package_name, price, client_name, phone, handle } => format!(
                "🔔 Новая запись!\n\n👨‍⚕️ {master_name}\n📅 {date}\n🕐 {time}\n💼 {package_name}\n💰 {price} ₽\n👤 {client_name}\n📞 {phone}\n💬 {handle}"
            ),
            Self::Cancelled { master_name, date, time, handle } => {
                format!("❌ Отмена записи\n\n👨‍⚕️ {master_name}\n📅 {date}\n🕐 {time}\n💬 {handle}")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Best-effort fan-out to the administrator list. Failures are logged per
/// recipient and never retried.
pub struct Notifier {
    sink: Arc<dyn MessageSink>,
    recipients: Vec<ChatId>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn MessageSink>, recipients: Vec<ChatId>) -> Self {
        Self { sink, recipients }
    }

    pub async fn announce(&self, event: &BookingEvent) -> NotifyReport {
        let text = event.render();
        let mut report = NotifyReport::default();

        for chat in &self.recipients {
            match self.sink.send_text(*chat, &text).await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        event_name = "notifier.delivery_failed",
                        chat_id = chat.0,
                        kind = event.kind(),
                        error = %error,
                        "admin notification not delivered"
                    );
                }
            }
        }

        info!(
            event_name = "notifier.announced",
            kind = event.kind(),
            delivered = report.delivered,
            failed = report.failed,
            "booking event announced"
        );
        report
    }
}

/// Records every sent message; optionally fails for chosen chats.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMessageSink {
    sent: Arc<Mutex<Vec<(ChatId, String)>>>,
    failing: Vec<ChatId>,
}

impl InMemoryMessageSink {
    pub fn failing_for(chats: impl IntoIterator<Item = ChatId>) -> Self {
        Self { failing: chats.into_iter().collect(), ..Self::default() }
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl MessageSink for InMemoryMessageSink {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), DeliveryError> {
        if self.failing.contains(&chat) {
            return Err(DeliveryError { chat_id: chat.0, message: "recipient unreachable".to_owned() });
        }
        match self.sent.lock() {
            Ok(mut guard) => guard.push((chat, text.to_owned())),
            Err(poisoned) => poisoned.into_inner().push((chat, text.to_owned())),
        }
        Ok(())
    }
}
