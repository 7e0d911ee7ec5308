//! Messaging transport boundary for slotbook.
//!
//! - **Events** (`events`) - inbound update model and the dispatcher that
//!   feeds the dialogue engine
//! - **Keyboards** (`keyboard`) - prompt menus rendered as Bot API markup
//! - **Transport** (`transport`) - the `BotTransport` seam and the admin
//!   notification sink built on it
//! - **Telegram** (`telegram`) - long-polling Bot API client over HTTPS
//! - **Runner** (`runner`) - poll loop with reconnect backoff
//!
//! ```text
//! Bot API → BotTransport → UpdateDispatcher → DialogueEngine
//!                ↑                                   ↓
//!                └────────── Outbound actions ← Reply
//! ```

pub mod events;
pub mod keyboard;
pub mod runner;
pub mod telegram;
pub mod transport;

pub use events::{default_dispatcher, Outbound, Update, UpdateDispatcher, UpdateKind};
pub use runner::PollingRunner;
pub use telegram::TelegramTransport;
pub use transport::{BotTransport, NoopTransport, ReconnectPolicy, TransportError, TransportMessageSink};
