pub mod availability;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod dialogue;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod notifier;
pub mod session;
pub mod store;

pub use availability::AvailabilityResolver;
pub use calendar::{Calendar, DatePage};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError, LoadOptions};
pub use dialogue::{DialogueDeps, DialogueEngine, DialogueSettings, Inbound, Reply};
pub use domain::booking::{Booking, BookingFilter, BookingId, BookingStatus, NewBooking};
pub use domain::catalog::{Catalog, Gender, Master, MasterId, Package, PackageKey};
pub use domain::client::{AdminSet, ChatId, ClientId, ClientProfile};
pub use errors::{DomainError, StoreError};
pub use ledger::{BookingLedger, LedgerError};
pub use notifier::{BookingEvent, DeliveryError, MessageSink, Notifier};
pub use session::SessionStore;
pub use store::{BookingStore, CatalogStore};
