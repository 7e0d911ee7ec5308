//! Booking records: reserve, cancel and the cancellation cutoff.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::calendar::{format_date, format_time, Calendar};
use crate::domain::booking::{Booking, BookingFilter, BookingId, NewBooking};
use crate::domain::catalog::{Gender, Master};
use crate::domain::client::{ClientId, ClientProfile};
use crate::errors::StoreError;
use crate::store::BookingStore;

pub const CANCELLATION_CUTOFF_HOURS: i64 = 2;
pub const BOOKING_SOURCE: &str = "bot";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("slot {date} {time} was taken by another booking")]
    SlotTaken { date: String, time: String },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::SlotTaken { date, time, .. } => Self::SlotTaken { date, time },
            other => Self::Store(other),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReservationRequest<'a> {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub gender: Gender,
    pub master: &'a Master,
    pub client: &'a ClientProfile,
    pub package_name: &'a str,
    pub client_name: &'a str,
    pub phone: &'a str,
}

pub struct BookingLedger {
    store: Arc<dyn BookingStore>,
    calendar: Calendar,
}

impl BookingLedger {
    pub fn new(store: Arc<dyn BookingStore>, calendar: Calendar) -> Self {
        Self { store, calendar }
    }

    /// Inserts a `booked` row. The store rejects a second booking of the same
    /// master at the same date and time.
    pub async fn reserve(&self, request: ReservationRequest<'_>, now: DateTime<Utc>) -> Result<BookingId, LedgerError> {
        let booking = NewBooking {
            date: format_date(request.date),
            time: format_time(request.time),
            gender: request.gender,
            master_id: request.master.id.clone(),
            master_name: request.master.name.clone(),
            user_id: request.client.id,
            username: request.client.username.clone(),
            client_name: Some(request.client_name.to_owned()),
            client_phone: Some(request.phone.to_owned()),
            package_name: Some(request.package_name.to_owned()),
            booked_at: self.calendar.booked_at(now),
            source: BOOKING_SOURCE.to_owned(),
        };

        let id = self.store.insert(booking).await?;
        info!(
            event_name = "ledger.reserved",
            booking_id = id.0,
            client_id = request.client.id.0,
            master_id = %request.master.id,
            date = %request.date,
            time = %request.time,
            "booking reserved"
        );
        Ok(id)
    }

    pub async fn cancel(&self, id: BookingId) -> Result<(), LedgerError> {
        self.store.cancel(id).await?;
        info!(event_name = "ledger.cancelled", booking_id = id.0, "booking cancelled");
        Ok(())
    }

    pub async fn find(&self, id: BookingId) -> Result<Option<Booking>, LedgerError> {
        Ok(self.store.find(id).await?)
    }

    /// Every active booking of a client, soonest slot first.
    pub async fn list_active(&self, client: ClientId) -> Result<Vec<Booking>, LedgerError> {
        let mut bookings = self.store.list(BookingFilter::booked().for_user(client)).await?;
        bookings.sort_by(|a, b| (&a.date, &a.time, a.id).cmp(&(&b.date, &b.time, b.id)));
        Ok(bookings)
    }

    pub async fn list(&self, filter: BookingFilter) -> Result<Vec<Booking>, LedgerError> {
        Ok(self.store.list(filter).await?)
    }

    /// True iff `now` is strictly before the slot start minus the cutoff.
    /// Unparseable stored slots are never cancellable.
    pub fn cancellable(&self, booking: &Booking, now: DateTime<Utc>) -> bool {
        let Some(start) = self.slot_start(booking) else {
            return false;
        };
        now < start - Duration::hours(CANCELLATION_CUTOFF_HOURS)
    }

    /// Slot start in UTC, if the stored date and time parse.
    pub fn slot_start(&self, booking: &Booking) -> Option<DateTime<Utc>> {
        let date = booking.slot_date()?;
        let time = booking.slot_time()?;
        self.calendar.slot_start(date, time).map(|start| start.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

    use super::{BookingLedger, LedgerError, ReservationRequest};
    use crate::calendar::{parse_utc_offset, Calendar};
    use crate::domain::booking::{BookingFilter, BookingStatus};
    use crate::domain::catalog::{Gender, Master, MasterId};
    use crate::domain::client::{ChatId, ClientId, ClientProfile};
    use crate::store::InMemoryBookingStore;

    fn ledger() -> BookingLedger {
        let calendar = Calendar::new(parse_utc_offset("+03:00").expect("offset"));
        BookingLedger::new(Arc::new(InMemoryBookingStore::new()), calendar)
    }

    fn anna() -> Master {
        Master {
            id: MasterId("anna".to_owned()),
            name: "Anna".to_owned(),
            code: "1111".to_owned(),
            contact: String::new(),
            gender: Gender::Female,
            active: true,
        }
    }

    fn client(id: i64) -> ClientProfile {
        ClientProfile::new(ClientId(id), ChatId(id), Some(format!("client{id}")))
    }

    fn request<'a>(master: &'a Master, client: &'a ClientProfile) -> ReservationRequest<'a> {
        ReservationRequest {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).expect("date"),
            time: NaiveTime::from_hms_opt(14, 0, 0).expect("time"),
            gender: Gender::Male,
            master,
            client,
            package_name: "Комплексная",
            client_name: "Ivan",
            phone: "+79990000000",
        }
    }

    fn moscow(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        // Moscow is UTC+3.
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().expect("utc") - Duration::hours(3)
    }

    #[tokio::test]
    async fn reserve_persists_a_booked_row_with_local_timestamp() {
        let ledger = ledger();
        let master = anna();
        let client = client(7);

        let id = ledger.reserve(request(&master, &client), moscow(2025, 3, 1, 10, 0)).await.expect("reserve");
        let booking = ledger.find(id).await.expect("find").expect("row");

        assert_eq!(booking.status, BookingStatus::Booked);
        assert_eq!(booking.date, "2025-03-10");
        assert_eq!(booking.time, "14:00");
        assert_eq!(booking.master_id, MasterId("anna".to_owned()));
        assert_eq!(booking.booked_at, "2025-03-01 10:00:00");
        assert_eq!(booking.source, "bot");
        assert_eq!(booking.user_id, Some(ClientId(7)));
    }

    #[tokio::test]
    async fn double_reservation_of_one_slot_is_refused() {
        let ledger = ledger();
        let master = anna();
        let (first, second) = (client(1), client(2));
        let now = moscow(2025, 3, 1, 10, 0);

        ledger.reserve(request(&master, &first), now).await.expect("first");
        let error = ledger.reserve(request(&master, &second), now).await.expect_err("second");

        assert!(matches!(error, LedgerError::SlotTaken { .. }));
    }

    #[tokio::test]
    async fn cutoff_is_strict_at_two_hours() {
        let ledger = ledger();
        let master = anna();
        let client = client(1);
        let id = ledger.reserve(request(&master, &client), moscow(2025, 3, 1, 10, 0)).await.expect("reserve");
        let booking = ledger.find(id).await.expect("find").expect("row");

        assert!(ledger.cancellable(&booking, moscow(2025, 3, 10, 11, 59)));
        assert!(!ledger.cancellable(&booking, moscow(2025, 3, 10, 12, 0)));
        assert!(!ledger.cancellable(&booking, moscow(2025, 3, 10, 13, 0)));
    }

    #[tokio::test]
    async fn malformed_slot_is_never_cancellable() {
        let ledger = ledger();
        let master = anna();
        let client = client(1);
        let id = ledger.reserve(request(&master, &client), moscow(2025, 3, 1, 10, 0)).await.expect("reserve");
        let mut booking = ledger.find(id).await.expect("find").expect("row");
        booking.time = "2pm".to_owned();

        assert!(!ledger.cancellable(&booking, moscow(2025, 3, 1, 10, 0)));
    }

    #[tokio::test]
    async fn list_active_returns_every_booked_row_soonest_first() {
        let ledger = ledger();
        let master = anna();
        let client = client(1);
        let now = moscow(2025, 3, 1, 10, 0);
        let mut later = request(&master, &client);
        later.date = NaiveDate::from_ymd_opt(2025, 3, 12).expect("date");
        ledger.reserve(later, now).await.expect("later");
        let sooner = ledger.reserve(request(&master, &client), now).await.expect("sooner");

        let active = ledger.list_active(ClientId(1)).await.expect("list");
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, sooner);

        ledger.cancel(sooner).await.expect("cancel");
        assert_eq!(ledger.list_active(ClientId(1)).await.expect("list").len(), 1);
        assert_eq!(ledger.list(BookingFilter::default()).await.expect("all").len(), 2);
    }
}
