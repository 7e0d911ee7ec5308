use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::availability::AvailabilityResolver;
use crate::calendar::{format_date, format_time, Calendar};
use crate::clock::Clock;
use crate::dialogue::prompt::{Ack, Prompt, Reply};
use crate::dialogue::screens::{self, BookingSummary, MasterStats, Venue};
use crate::dialogue::states::{Choice, ClientDraft, DialogueEvent, IdleCommand, Step};
use crate::domain::booking::{Booking, BookingFilter, BookingId};
use crate::domain::catalog::{Catalog, Gender, Master, MasterId};
use crate::domain::client::{AdminSet, ChatId, ClientProfile};
use crate::ledger::{BookingLedger, LedgerError, ReservationRequest};
use crate::notifier::{BookingEvent, MessageSink, Notifier};
use crate::session::SessionStore;
use crate::store::{BookingStore, CatalogStore};

const DEVELOPER_RECENT_LIMIT: u32 = 10;

#[derive(Clone, Debug)]
pub struct DialogueSettings {
    pub admins: AdminSet,
    pub venue: Venue,
    pub utc_offset: FixedOffset,
    pub session_idle_timeout: Duration,
}

/// Collaborators the engine talks to.
pub struct DialogueDeps {
    pub bookings: Arc<dyn BookingStore>,
    pub catalog_store: Arc<dyn CatalogStore>,
    pub sink: Arc<dyn MessageSink>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inbound {
    pub client: ClientProfile,
    pub event: DialogueEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionChange {
    Keep,
    Replace(Step),
    Clear,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub reply: Reply,
    pub session: SessionChange,
}

impl Outcome {
    fn keep(reply: Reply) -> Self {
        Self { reply, session: SessionChange::Keep }
    }

    fn replace(step: Step, prompt: Prompt) -> Self {
        Self { reply: Reply::prompt(prompt), session: SessionChange::Replace(step) }
    }

    fn clear(reply: Reply) -> Self {
        Self { reply, session: SessionChange::Clear }
    }
}

/// Owns every piece of mutable conversation state: sessions, the catalog
/// snapshot and the per-master notification flags.
pub struct DialogueEngine {
    admins: AdminSet,
    venue: Venue,
    calendar: Calendar,
    catalog: RwLock<Catalog>,
    catalog_store: Arc<dyn CatalogStore>,
    sessions: SessionStore,
    availability: AvailabilityResolver,
    ledger: BookingLedger,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    notify_enabled: Mutex<HashSet<MasterId>>,
}

impl DialogueEngine {
    pub fn new(settings: DialogueSettings, catalog: Catalog, deps: DialogueDeps) -> Self {
        let calendar = Calendar::new(settings.utc_offset);
        let recipients = settings.admins.iter().map(|id| ChatId::from(*id)).collect();
        Self {
            admins: settings.admins,
            venue: settings.venue,
            calendar: calendar.clone(),
            catalog: RwLock::new(catalog),
            catalog_store: deps.catalog_store,
            sessions: SessionStore::new(settings.session_idle_timeout),
            availability: AvailabilityResolver::new(deps.bookings.clone()),
            ledger: BookingLedger::new(deps.bookings, calendar),
            notifier: Notifier::new(deps.sink, recipients),
            clock: deps.clock,
            notify_enabled: Mutex::new(HashSet::new()),
        }
    }

    /// Applies one inbound event to the sender's session and returns the reply.
    pub async fn handle(&self, inbound: &Inbound) -> Reply {
        let now = self.clock.now();
        let client = inbound.client.id;
        let current = self.sessions.load(client, now);

        let outcome = self.step(&inbound.client, current.as_ref(), &inbound.event, now).await;

        let from = current.as_ref().map_or("idle", |step| step.kind().as_str());
        let to = match &outcome.session {
            SessionChange::Keep => from,
            SessionChange::Replace(step) => step.kind().as_str(),
            SessionChange::Clear => "idle",
        };
        debug!(event_name = "dialogue.transition", client_id = client.0, from, to, "event handled");

        match outcome.session {
            SessionChange::Keep => {
                if let Some(step) = current {
                    self.sessions.save(client, step, now);
                }
            }
            SessionChange::Replace(step) => self.sessions.save(client, step, now),
            SessionChange::Clear => self.sessions.clear(client),
        }
        outcome.reply
    }

    /// Pure transition for a given session position; does not touch the
    /// session store.
    pub async fn step(
        &self,
        client: &ClientProfile,
        current: Option<&Step>,
        event: &DialogueEvent,
        now: DateTime<Utc>,
    ) -> Outcome {
        match (current, event) {
            (None, DialogueEvent::Text(text)) => self.on_idle_text(client, text, now).await,
            (None, DialogueEvent::Choice(choice)) => self.on_idle_choice(client, choice, now).await,
            (None, DialogueEvent::Unrecognized(_)) => Outcome::keep(Reply::ack(Ack::alert(screens::SELECTION_MISSING))),
            (Some(step), DialogueEvent::Text(text)) => self.on_text(step, text, now).await,
            (Some(step), DialogueEvent::Choice(choice)) => self.on_choice(client, step, choice, now).await,
            (Some(step), DialogueEvent::Unrecognized(_)) => Outcome::keep(Reply::prompt(self.render(step, now).await)),
        }
    }

    pub fn session(&self, client: &ClientProfile) -> Option<Step> {
        self.sessions.load(client.id, self.clock.now())
    }

    pub fn sweep_sessions(&self) -> usize {
        self.sessions.sweep(self.clock.now())
    }

    pub fn is_admin(&self, client: &ClientProfile) -> bool {
        self.admins.contains(client.id)
    }

    pub fn catalog(&self) -> Catalog {
        match self.catalog.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn notifications_enabled(&self, master: &MasterId) -> bool {
        match self.notify_enabled.lock() {
            Ok(guard) => guard.contains(master),
            Err(poisoned) => poisoned.into_inner().contains(master),
        }
    }

    async fn on_idle_text(&self, client: &ClientProfile, text: &str, now: DateTime<Utc>) -> Outcome {
        let Some(command) = IdleCommand::detect(text) else {
            return Outcome::keep(Reply::none());
        };
        let prompt = match command {
            IdleCommand::Start => screens::start_menu(self.is_admin(client)),
            IdleCommand::Book => screens::package_menu(&self.catalog()),
            IdleCommand::OtherOptions => screens::other_options(),
            IdleCommand::AdminPanel if self.is_admin(client) => screens::admin_home(),
            IdleCommand::AdminPanel => return Outcome::keep(Reply::none()),
            IdleCommand::MyBookings => return Outcome::keep(self.my_bookings(client, now).await),
        };
        Outcome::keep(Reply::prompt(prompt))
    }

    async fn on_idle_choice(&self, client: &ClientProfile, choice: &Choice, now: DateTime<Utc>) -> Outcome {
        if choice.is_admin() && !self.is_admin(client) {
            return Outcome::keep(Reply::ack(Ack::alert(screens::ADMIN_ONLY)));
        }
        if !choice.is_sessionless() {
            return Outcome::keep(Reply::ack(Ack::alert(screens::SELECTION_MISSING)));
        }

        match choice {
            Choice::Package(key) => match self.catalog().package(key) {
                Some(package) => {
                    Outcome::replace(Step::PackageSelected { package: key.clone() }, screens::package_details(package))
                }
                None => Outcome::keep(Reply::ack(Ack::alert(screens::PACKAGE_MISSING))),
            },
            Choice::CancelBooking(id) => Outcome::keep(self.cancel_booking(client, *id, now).await),
            Choice::AdminHome => Outcome::keep(Reply::prompt(screens::admin_home())),
            Choice::AdminMasters => Outcome::keep(Reply::prompt(self.masters_list())),
            Choice::AdminDeveloper => Outcome::keep(Reply::prompt(self.developer().await)),
            Choice::AddMasterStart => Outcome::replace(Step::AddMasterName, screens::ask_master_name()),
            Choice::MasterProfile(id) => match self.catalog().master(id) {
                Some(master) => Outcome::replace(Step::MasterLogin { master: id.clone() }, screens::master_login(master)),
                None => Outcome::keep(Reply::ack(Ack::alert(screens::MASTER_NOT_FOUND))),
            },
            Choice::MasterBookings(id)
            | Choice::MasterProfit(id)
            | Choice::MasterNotify(id)
            | Choice::MasterBack(id) => Outcome::keep(self.master_screen(choice, id, now).await),
            _ => Outcome::keep(Reply::ack(Ack::alert(screens::SELECTION_MISSING))),
        }
    }

    async fn on_text(&self, step: &Step, text: &str, now: DateTime<Utc>) -> Outcome {
        let text = text.trim();
        if text.is_empty() || !step.accepts_text() {
            return Outcome::keep(Reply::prompt(self.render(step, now).await));
        }

        match step.clone() {
            Step::AwaitingName { package, gender } => Outcome::replace(
                Step::AwaitingPhone { package, gender, client_name: text.to_owned() },
                screens::ask_phone(),
            ),
            Step::AwaitingPhone { package, gender, client_name } => {
                let draft = ClientDraft { package, gender, client_name, phone: text.to_owned() };
                Outcome::replace(Step::ChoosingDate { draft, page: 0 }, screens::date_picker(&self.calendar.page(now, 0)))
            }
            Step::MasterLogin { master } => {
                let prompt = match self.catalog().master(&master) {
                    Some(found) if found.code == text => {
                        let stats = self.master_stats(found, now).await;
                        screens::master_profile(found, &stats)
                    }
                    _ => screens::wrong_code(),
                };
                Outcome::clear(Reply::prompt(prompt))
            }
            Step::AddMasterName => {
                Outcome::replace(Step::AddMasterCode { name: text.to_owned() }, screens::ask_master_code())
            }
            Step::AddMasterCode { name } => Outcome::replace(
                Step::AddMasterContact { name, code: text.to_owned() },
                screens::ask_master_contact(),
            ),
            Step::AddMasterContact { name, code } => {
                let contact = if text == "-" { String::new() } else { text.to_owned() };
                Outcome::replace(Step::AddMasterGender { name, code, contact }, screens::ask_master_gender())
            }
            other => Outcome::keep(Reply::prompt(self.render(&other, now).await)),
        }
    }

    async fn on_choice(&self, client: &ClientProfile, step: &Step, choice: &Choice, now: DateTime<Utc>) -> Outcome {
        if *choice == Choice::Back {
            return self.back(step, now).await;
        }
        if step.is_admin() && *choice == Choice::AdminMasters {
            return Outcome::clear(Reply::prompt(self.masters_list()));
        }

        match (step.clone(), choice) {
            (Step::PackageSelected { package }, Choice::Gender(gender)) => {
                Outcome::replace(Step::GenderChosen { package, gender: *gender }, screens::age_gate())
            }
            (Step::GenderChosen { package, gender }, Choice::AgeConfirmed) => {
                Outcome::replace(Step::AwaitingName { package, gender }, screens::ask_name())
            }
            (Step::GenderChosen { .. }, Choice::AgeDeclined) => Outcome::clear(Reply::prompt(screens::underage())),
            (Step::ChoosingDate { draft, .. }, Choice::DatePage(page)) if *page < self.calendar.page_count() => {
                let page = self.calendar.page(now, *page);
                Outcome::replace(Step::ChoosingDate { draft, page: page.page }, screens::date_picker(&page))
            }
            (Step::ChoosingDate { draft, .. }, Choice::Date(date)) if self.calendar.contains_date(now, *date) => {
                Outcome::replace(
                    Step::DateChosen { draft, date: *date },
                    screens::time_picker(*date, self.calendar.time_slots()),
                )
            }
            (Step::DateChosen { draft, date }, Choice::Time(time)) if self.calendar.is_slot(*time) => {
                let prompt = self.master_picker(date, *time).await;
                Outcome::replace(Step::TimeChosen { draft, date, time: *time }, prompt)
            }
            (Step::TimeChosen { draft, date, time }, Choice::Master(master)) => {
                self.choose_master(draft, date, time, master).await
            }
            (Step::AwaitingConfirmation { draft, date, time, master }, Choice::ConfirmBooking) => {
                self.confirm(client, draft, date, time, master, now).await
            }
            (Step::AddMasterGender { name, code, contact }, Choice::MasterGender(gender)) => {
                self.add_master(name, code, contact, *gender).await
            }
            (current, _) => Outcome::keep(Reply::prompt(self.render(&current, now).await)),
        }
    }

    async fn back(&self, step: &Step, now: DateTime<Utc>) -> Outcome {
        match step.previous() {
            None if step.is_admin() => Outcome::clear(Reply::prompt(self.masters_list())),
            None => Outcome::clear(Reply::prompt(screens::package_overview(&self.catalog()))),
            Some(previous) => {
                let previous = match (previous, step) {
                    (Step::ChoosingDate { draft, .. }, Step::DateChosen { date, .. }) => {
                        Step::ChoosingDate { draft, page: self.calendar.page_of(now, *date) }
                    }
                    (previous, _) => previous,
                };
                let prompt = self.render(&previous, now).await;
                Outcome::replace(previous, prompt)
            }
        }
    }

    /// Rebuilds the prompt for a step from the fields it carries.
    async fn render(&self, step: &Step, now: DateTime<Utc>) -> Prompt {
        match step {
            Step::PackageSelected { package } => match self.catalog().package(package) {
                Some(package) => screens::package_details(package),
                None => screens::package_menu(&self.catalog()),
            },
            Step::GenderChosen { .. } => screens::age_gate(),
            Step::AwaitingName { .. } => screens::ask_name(),
            Step::AwaitingPhone { .. } => screens::ask_phone(),
            Step::ChoosingDate { page, .. } => screens::date_picker(&self.calendar.page(now, *page)),
            Step::DateChosen { date, .. } => screens::time_picker(*date, self.calendar.time_slots()),
            Step::TimeChosen { date, time, .. } => self.master_picker(*date, *time).await,
            Step::AwaitingConfirmation { draft, date, time, master } => {
                screens::confirmation(&self.summary(draft, *date, *time, master), &self.venue)
            }
            Step::MasterLogin { master } => match self.catalog().master(master) {
                Some(found) => screens::master_login(found),
                None => self.masters_list(),
            },
            Step::AddMasterName => screens::ask_master_name(),
            Step::AddMasterCode { .. } => screens::ask_master_code(),
            Step::AddMasterContact { .. } => screens::ask_master_contact(),
            Step::AddMasterGender { .. } => screens::ask_master_gender(),
        }
    }

    async fn master_picker(&self, date: NaiveDate, time: NaiveTime) -> Prompt {
        let masters = self.catalog().active_masters();
        let free = self.availability.available(&masters, date, time).await;
        screens::master_picker(date, time, &free)
    }

    async fn choose_master(&self, draft: ClientDraft, date: NaiveDate, time: NaiveTime, master: &MasterId) -> Outcome {
        let masters = self.catalog().active_masters();
        if !self.availability.is_available(&masters, master, date, time).await {
            let prompt = self.master_picker(date, time).await;
            return Outcome::keep(Reply::prompt(prompt).with_ack(Ack::alert(screens::MASTER_TAKEN)));
        }
        let summary = self.summary(&draft, date, time, master);
        Outcome::replace(
            Step::AwaitingConfirmation { draft, date, time, master: master.clone() },
            screens::confirmation(&summary, &self.venue),
        )
    }

    fn summary(&self, draft: &ClientDraft, date: NaiveDate, time: NaiveTime, master: &MasterId) -> BookingSummary {
        let catalog = self.catalog();
        let package = catalog.package(&draft.package);
        BookingSummary {
            date,
            time,
            master_name: catalog.master(master).map_or_else(|| master.0.clone(), |m| m.name.clone()),
            package_name: package.map_or_else(|| draft.package.0.clone(), |p| p.name.clone()),
            price: package.map_or(Decimal::ZERO, |p| p.price),
        }
    }

    async fn confirm(
        &self,
        client: &ClientProfile,
        draft: ClientDraft,
        date: NaiveDate,
        time: NaiveTime,
        master_id: MasterId,
        now: DateTime<Utc>,
    ) -> Outcome {
        let catalog = self.catalog();
        let Some(package) = catalog.package(&draft.package) else {
            return Outcome::keep(Reply::ack(Ack::alert(screens::PACKAGE_MISSING)));
        };
        let Some(master) = catalog.master(&master_id) else {
            return Outcome::keep(Reply::ack(Ack::alert(screens::MASTER_MISSING)));
        };

        let request = ReservationRequest {
            date,
            time,
            gender: draft.gender,
            master,
            client,
            package_name: &package.name,
            client_name: &draft.client_name,
            phone: &draft.phone,
        };

        match self.ledger.reserve(request, now).await {
            Ok(_) => {
                self.notifier
                    .announce(&BookingEvent::Created {
                        master_name: master.name.clone(),
                        date: format_date(date),
                        time: format_time(time),
                        package_name: package.name.clone(),
                        price: package.price,
                        client_name: draft.client_name.clone(),
                        phone: draft.phone.clone(),
                        handle: client.handle(),
                    })
                    .await;
                let summary = self.summary(&draft, date, time, &master_id);
                Outcome::clear(
                    Reply::prompt(screens::booked(&summary, &self.venue)).with_ack(Ack::toast(screens::BOOKING_DONE)),
                )
            }
            Err(LedgerError::SlotTaken { .. }) => {
                let prompt = self.master_picker(date, time).await;
                Outcome {
                    reply: Reply::prompt(prompt).with_ack(Ack::alert(screens::SLOT_TAKEN)),
                    session: SessionChange::Replace(Step::TimeChosen { draft, date, time }),
                }
            }
            Err(error) => {
                warn!(
                    event_name = "dialogue.reserve_failed",
                    client_id = client.id.0,
                    error = %error,
                    "booking could not be stored"
                );
                Outcome::keep(Reply::ack(Ack::alert(screens::BOOKING_FAILED)))
            }
        }
    }

    async fn my_bookings(&self, client: &ClientProfile, now: DateTime<Utc>) -> Reply {
        let bookings = match self.ledger.list_active(client.id).await {
            Ok(bookings) => bookings,
            Err(error) => {
                warn!(event_name = "dialogue.bookings_read_failed", client_id = client.id.0, error = %error, "bookings unavailable");
                Vec::new()
            }
        };

        let mut cards = bookings.iter().map(|booking| screens::booking_card(booking, self.ledger.cancellable(booking, now)));
        match cards.next() {
            Some(first) => Reply::prompt(first).with_extra(cards.collect()),
            None => Reply::prompt(screens::no_bookings()),
        }
    }

    async fn cancel_booking(&self, client: &ClientProfile, id: BookingId, now: DateTime<Utc>) -> Reply {
        let booking = match self.ledger.find(id).await {
            Ok(Some(booking)) => booking,
            Ok(None) => return Reply::ack(Ack::alert(screens::BOOKING_NOT_FOUND)),
            Err(error) => {
                warn!(event_name = "dialogue.booking_read_failed", booking_id = id.0, error = %error, "booking lookup failed");
                return Reply::ack(Ack::alert(screens::BOOKING_NOT_FOUND));
            }
        };

        if !booking.is_active() {
            return Reply::prompt(screens::already_cancelled()).with_ack(Ack::toast(screens::CANCEL_DONE));
        }
        if booking.user_id != Some(client.id) {
            return Reply::ack(Ack::alert(screens::BOOKING_NOT_FOUND));
        }
        if !self.ledger.cancellable(&booking, now) {
            return Reply::ack(Ack::alert(screens::CANCEL_TOO_LATE));
        }

        if let Err(error) = self.ledger.cancel(id).await {
            warn!(event_name = "dialogue.cancel_failed", booking_id = id.0, error = %error, "booking could not be cancelled");
            return Reply::ack(Ack::alert(screens::CANCEL_FAILED));
        }

        self.notifier
            .announce(&BookingEvent::Cancelled {
                master_name: booking.master_name.clone(),
                date: booking.date.clone(),
                time: booking.time.clone(),
                handle: client.handle(),
            })
            .await;
        Reply::prompt(screens::cancelled()).with_ack(Ack::toast(screens::CANCEL_DONE))
    }

    fn masters_list(&self) -> Prompt {
        screens::masters_list(&self.catalog().active_masters())
    }

    async fn developer(&self) -> Prompt {
        match self.ledger.list(BookingFilter::default().limit(DEVELOPER_RECENT_LIMIT)).await {
            Ok(recent) => screens::developer(Some(&recent)),
            Err(error) => {
                warn!(event_name = "dialogue.developer_read_failed", error = %error, "recent bookings unavailable");
                screens::developer(None)
            }
        }
    }

    async fn master_screen(&self, choice: &Choice, id: &MasterId, now: DateTime<Utc>) -> Reply {
        let Some(master) = self.catalog().master(id).cloned() else {
            return Reply::ack(Ack::alert(screens::MASTER_NOT_FOUND));
        };

        match choice {
            Choice::MasterBookings(_) => {
                let mut bookings = self.master_bookings(&master).await;
                bookings.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));
                Reply::prompt(screens::master_bookings(&master, &bookings))
            }
            Choice::MasterProfit(_) => {
                let stats = self.master_stats(&master, now).await;
                Reply::prompt(screens::master_profit(&master, &stats))
            }
            Choice::MasterNotify(_) => {
                let enabled = self.toggle_notifications(id);
                Reply::prompt(screens::master_notifications(id, enabled))
            }
            _ => {
                let stats = self.master_stats(&master, now).await;
                Reply::prompt(screens::master_profile(&master, &stats))
            }
        }
    }

    fn toggle_notifications(&self, id: &MasterId) -> bool {
        let mut enabled = match self.notify_enabled.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if enabled.remove(id) {
            false
        } else {
            enabled.insert(id.clone());
            true
        }
    }

    async fn master_bookings(&self, master: &Master) -> Vec<Booking> {
        match self.ledger.list(BookingFilter::booked().for_master(master.id.clone())).await {
            Ok(bookings) => bookings,
            Err(error) => {
                warn!(event_name = "dialogue.master_bookings_failed", master_id = %master.id, error = %error, "master bookings unavailable");
                Vec::new()
            }
        }
    }

    /// Completed means the slot has started; profit sums catalog prices by
    /// package name.
    async fn master_stats(&self, master: &Master, now: DateTime<Utc>) -> MasterStats {
        let catalog = self.catalog();
        let mut stats = MasterStats::default();
        for booking in self.master_bookings(master).await {
            let started = self.ledger.slot_start(&booking).is_some_and(|start| start <= now);
            if !started {
                stats.upcoming += 1;
                continue;
            }
            stats.completed += 1;
            if let Some(package) = booking.package_name.as_deref().and_then(|name| catalog.package_by_name(name)) {
                stats.profit += package.price;
            }
        }
        stats
    }

    async fn add_master(&self, name: String, code: String, contact: String, gender: Gender) -> Outcome {
        let master = Master {
            id: self.catalog().unused_master_id(&name),
            name: name.clone(),
            code,
            contact,
            gender,
            active: true,
        };

        if let Err(error) = self.catalog_store.insert_master(master.clone()).await {
            warn!(event_name = "dialogue.master_save_failed", master_id = %master.id, error = %error, "master not stored");
            return Outcome::keep(Reply::ack(Ack::alert(screens::MASTER_SAVE_FAILED)));
        }

        let added = match self.catalog.write() {
            Ok(mut guard) => guard.add_master(master.clone()),
            Err(poisoned) => poisoned.into_inner().add_master(master.clone()),
        };
        if let Err(error) = added {
            warn!(event_name = "dialogue.master_snapshot_failed", master_id = %master.id, error = %error, "catalog snapshot not updated");
        }
        Outcome::clear(Reply::prompt(screens::master_added(&name)))
    }
}
