use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use slotbook_core::dialogue::{Ack, DialogueEngine, DialogueEvent, Inbound, Menu, Prompt, Reply};
use slotbook_core::domain::client::{ChatId, ClientId, ClientProfile};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    pub kind: UpdateKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    Message(IncomingMessage),
    Callback(CallbackQuery),
    Unsupported { kind: String },
}

impl UpdateKind {
    pub fn update_type(&self) -> UpdateType {
        match self {
            Self::Message(_) => UpdateType::Message,
            Self::Callback(_) => UpdateType::Callback,
            Self::Unsupported { .. } => UpdateType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateType {
    Message,
    Callback,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub from: Sender,
    pub text: String,
}

/// Button press on an inline menu. `message_id` identifies the message the
/// menu is attached to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackQuery {
    pub id: String,
    pub chat_id: i64,
    pub message_id: i64,
    pub from: Sender,
    pub data: String,
}

fn profile(chat_id: i64, from: &Sender) -> ClientProfile {
    ClientProfile::new(ClientId(from.id), ChatId(chat_id), from.username.clone())
}

/// One call the runner makes against the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Send { chat: ChatId, prompt: Prompt },
    Edit { chat: ChatId, message_id: i64, prompt: Prompt },
    Answer { callback_id: String, ack: Option<Ack> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<Outbound>),
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("update {update_id} reached the {handler} handler with the wrong payload")]
    Mismatch { update_id: i64, handler: &'static str },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Turns an inbound event into the reply the client should see.
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn converse(&self, inbound: &Inbound) -> Reply;
}

#[async_trait]
impl ConversationService for DialogueEngine {
    async fn converse(&self, inbound: &Inbound) -> Reply {
        self.handle(inbound).await
    }
}

/// Ignores everything; used when no engine is wired.
pub struct NoopConversationService;

#[async_trait]
impl ConversationService for NoopConversationService {
    async fn converse(&self, _inbound: &Inbound) -> Reply {
        Reply::none()
    }
}

#[async_trait]
pub trait UpdateHandler: Send + Sync {
    fn update_type(&self) -> UpdateType;
    async fn handle(&self, update: &Update) -> Result<HandlerResult, HandlerError>;
}

#[derive(Default)]
pub struct UpdateDispatcher {
    handlers: HashMap<UpdateType, Arc<dyn UpdateHandler>>,
}

impl UpdateDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: UpdateHandler + 'static,
    {
        self.handlers.insert(handler.update_type(), Arc::new(handler));
    }

    pub async fn dispatch(&self, update: &Update) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&update.kind.update_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(update).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Message and callback handlers sharing one conversation service.
pub fn default_dispatcher<S>(service: Arc<S>) -> UpdateDispatcher
where
    S: ConversationService + ?Sized + 'static,
{
    let mut dispatcher = UpdateDispatcher::new();
    dispatcher.register(MessageHandler::new(service.clone()));
    dispatcher.register(CallbackHandler::new(service));
    dispatcher
}

pub struct MessageHandler<S: ?Sized> {
    service: Arc<S>,
}

impl<S: ConversationService + ?Sized> MessageHandler<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> UpdateHandler for MessageHandler<S>
where
    S: ConversationService + ?Sized + 'static,
{
    fn update_type(&self) -> UpdateType {
        UpdateType::Message
    }

    async fn handle(&self, update: &Update) -> Result<HandlerResult, HandlerError> {
        let UpdateKind::Message(message) = &update.kind else {
            return Err(HandlerError::Mismatch { update_id: update.update_id, handler: "message" });
        };

        let inbound = Inbound {
            client: profile(message.chat_id, &message.from),
            event: DialogueEvent::Text(message.text.clone()),
        };
        let reply = self.service.converse(&inbound).await;
        let actions = message_actions(ChatId(message.chat_id), reply);
        Ok(if actions.is_empty() { HandlerResult::Ignored } else { HandlerResult::Responded(actions) })
    }
}

pub struct CallbackHandler<S: ?Sized> {
    service: Arc<S>,
}

impl<S: ConversationService + ?Sized> CallbackHandler<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> UpdateHandler for CallbackHandler<S>
where
    S: ConversationService + ?Sized + 'static,
{
    fn update_type(&self) -> UpdateType {
        UpdateType::Callback
    }

    async fn handle(&self, update: &Update) -> Result<HandlerResult, HandlerError> {
        let UpdateKind::Callback(query) = &update.kind else {
            return Err(HandlerError::Mismatch { update_id: update.update_id, handler: "callback" });
        };

        let inbound = Inbound {
            client: profile(query.chat_id, &query.from),
            event: DialogueEvent::from_callback(&query.data),
        };
        let reply = self.service.converse(&inbound).await;
        Ok(HandlerResult::Responded(callback_actions(query, reply)))
    }
}

/// Text events have nothing to acknowledge, so an ack is delivered as a
/// plain message after the prompts.
pub fn message_actions(chat: ChatId, reply: Reply) -> Vec<Outbound> {
    let mut actions: Vec<Outbound> = reply
        .primary
        .into_iter()
        .chain(reply.extra)
        .map(|prompt| Outbound::Send { chat, prompt })
        .collect();
    if let Some(ack) = reply.ack {
        actions.push(Outbound::Send { chat, prompt: Prompt::text(ack.text) });
    }
    actions
}

/// Every callback is answered first, even without an ack, so the client's
/// button spinner stops. The primary prompt replaces the pressed message
/// unless it carries a reply keyboard, which only a new message can attach.
pub fn callback_actions(query: &CallbackQuery, reply: Reply) -> Vec<Outbound> {
    let chat = ChatId(query.chat_id);
    let mut actions = vec![Outbound::Answer { callback_id: query.id.clone(), ack: reply.ack }];

    if let Some(prompt) = reply.primary {
        if matches!(prompt.menu, Menu::Keyboard { .. }) {
            actions.push(Outbound::Send { chat, prompt });
        } else {
            actions.push(Outbound::Edit { chat, message_id: query.message_id, prompt });
        }
    }
    actions.extend(reply.extra.into_iter().map(|prompt| Outbound::Send { chat, prompt }));
    actions
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use slotbook_core::dialogue::{Ack, Choice, DialogueEvent, Inbound, Prompt, PromptBuilder, Reply};
    use slotbook_core::domain::client::ChatId;

    use super::{
        callback_actions, default_dispatcher, message_actions, CallbackQuery, ConversationService,
        HandlerResult, IncomingMessage, Outbound, Sender, Update, UpdateKind,
    };

    #[derive(Default)]
    struct RecordingService {
        seen: Mutex<Vec<Inbound>>,
        reply: Reply,
    }

    #[async_trait]
    impl ConversationService for RecordingService {
        async fn converse(&self, inbound: &Inbound) -> Reply {
            self.seen.lock().await.push(inbound.clone());
            self.reply.clone()
        }
    }

    fn sender() -> Sender {
        Sender { id: 7, username: Some("ivan".to_owned()) }
    }

    fn callback(data: &str) -> CallbackQuery {
        CallbackQuery { id: "cb-1".to_owned(), chat_id: 7, message_id: 55, from: sender(), data: data.to_owned() }
    }

    #[tokio::test]
    async fn callback_data_is_decoded_into_choices() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = default_dispatcher(service.clone());

        dispatcher
            .dispatch(&Update { update_id: 1, kind: UpdateKind::Callback(callback("age_yes")) })
            .await
            .expect("dispatch");
        dispatcher
            .dispatch(&Update { update_id: 2, kind: UpdateKind::Callback(callback("bogus")) })
            .await
            .expect("dispatch");

        let seen = service.seen.lock().await;
        assert_eq!(seen[0].event, DialogueEvent::Choice(Choice::AgeConfirmed));
        assert_eq!(seen[1].event, DialogueEvent::Unrecognized("bogus".to_owned()));
        assert_eq!(seen[0].client.handle(), "@ivan");
    }

    #[tokio::test]
    async fn silent_text_reply_is_ignored_and_unsupported_updates_skip_handlers() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = default_dispatcher(service.clone());
        assert_eq!(dispatcher.handler_count(), 2);

        let message = IncomingMessage { chat_id: 7, from: sender(), text: "привет".to_owned() };
        let result = dispatcher
            .dispatch(&Update { update_id: 3, kind: UpdateKind::Message(message) })
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);

        let result = dispatcher
            .dispatch(&Update { update_id: 4, kind: UpdateKind::Unsupported { kind: "poll".to_owned() } })
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
        assert_eq!(service.seen.lock().await.len(), 1);
    }

    #[test]
    fn text_acks_become_messages() {
        let reply = Reply::prompt(Prompt::text("first")).with_ack(Ack::alert("warned"));
        let actions = message_actions(ChatId(7), reply);

        assert_eq!(
            actions,
            vec![
                Outbound::Send { chat: ChatId(7), prompt: Prompt::text("first") },
                Outbound::Send { chat: ChatId(7), prompt: Prompt::text("warned") },
            ]
        );
    }

    #[test]
    fn callbacks_answer_then_edit_then_send_extras() {
        let reply = Reply::prompt(Prompt::text("edited"))
            .with_extra(vec![Prompt::text("extra")])
            .with_ack(Ack::toast("done"));
        let actions = callback_actions(&callback("confirm_booking"), reply);

        assert_eq!(actions.len(), 3);
        assert!(matches!(&actions[0], Outbound::Answer { ack: Some(ack), .. } if ack.text == "done"));
        assert!(matches!(&actions[1], Outbound::Edit { message_id: 55, .. }));
        assert!(matches!(&actions[2], Outbound::Send { prompt, .. } if prompt.text == "extra"));
    }

    #[test]
    fn keyboard_prompts_are_sent_not_edited() {
        let prompt = PromptBuilder::new("menu").key("📋 Мои записи").build();
        let actions = callback_actions(&callback("back"), Reply::prompt(prompt));

        assert!(matches!(&actions[0], Outbound::Answer { ack: None, .. }));
        assert!(matches!(&actions[1], Outbound::Send { .. }));
    }
}
