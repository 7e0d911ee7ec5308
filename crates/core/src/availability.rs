use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::warn;

use crate::domain::booking::BookingFilter;
use crate::domain::catalog::{Master, MasterId};
use crate::store::BookingStore;

/// Free providers for a slot: active masters minus those with a `booked` row.
pub struct AvailabilityResolver {
    store: Arc<dyn BookingStore>,
}

impl AvailabilityResolver {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Never fails: a store read error yields an empty result.
    pub async fn available(&self, masters: &[Master], date: NaiveDate, time: NaiveTime) -> Vec<Master> {
        let booked = match self.store.list(BookingFilter::booked().at(date, time)).await {
            Ok(rows) => rows.into_iter().map(|row| row.master_id).collect::<HashSet<MasterId>>(),
            Err(error) => {
                warn!(
                    event_name = "availability.read_failed",
                    %date,
                    %time,
                    error = %error,
                    "booked slots could not be read; reporting no free masters"
                );
                return Vec::new();
            }
        };

        masters.iter().filter(|master| master.active && !booked.contains(&master.id)).cloned().collect()
    }

    pub async fn is_available(&self, masters: &[Master], master: &MasterId, date: NaiveDate, time: NaiveTime) -> bool {
        self.available(masters, date, time).await.iter().any(|free| free.id == *master)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};

    use super::AvailabilityResolver;
    use crate::domain::booking::NewBooking;
    use crate::domain::catalog::{Gender, Master, MasterId};
    use crate::domain::client::ClientId;
    use crate::store::{BookingStore, InMemoryBookingStore};

    fn master(id: &str) -> Master {
        Master {
            id: MasterId(id.to_owned()),
            name: id.to_uppercase(),
            code: "1".to_owned(),
            contact: String::new(),
            gender: Gender::Female,
            active: true,
        }
    }

    fn slot() -> (NaiveDate, NaiveTime) {
        (
            NaiveDate::from_ymd_opt(2025, 3, 10).expect("date"),
            NaiveTime::from_hms_opt(14, 0, 0).expect("time"),
        )
    }

    fn booking(master_id: &str, time: &str) -> NewBooking {
        NewBooking {
            date: "2025-03-10".to_owned(),
            time: time.to_owned(),
            gender: Gender::Male,
            master_id: MasterId(master_id.to_owned()),
            // Same display name for both masters: availability must go by id.
            master_name: "Anna".to_owned(),
            user_id: ClientId(1),
            username: None,
            client_name: None,
            client_phone: None,
            package_name: None,
            booked_at: "2025-03-01 10:00:00".to_owned(),
            source: "bot".to_owned(),
        }
    }

    #[tokio::test]
    async fn all_masters_free_without_bookings() {
        let resolver = AvailabilityResolver::new(Arc::new(InMemoryBookingStore::new()));
        let (date, time) = slot();

        let free = resolver.available(&[master("anna"), master("olga")], date, time).await;

        assert_eq!(free.len(), 2);
    }

    #[tokio::test]
    async fn booked_master_is_excluded_only_at_that_slot() {
        let store = Arc::new(InMemoryBookingStore::new());
        store.insert(booking("anna", "14:00")).await.expect("insert");
        store.insert(booking("olga", "15:00")).await.expect("insert");
        let resolver = AvailabilityResolver::new(store);
        let (date, time) = slot();
        let masters = [master("anna"), master("olga")];

        let free = resolver.available(&masters, date, time).await;

        assert_eq!(free.iter().map(|m| m.id.0.as_str()).collect::<Vec<_>>(), vec!["olga"]);
        assert!(!resolver.is_available(&masters, &MasterId("anna".to_owned()), date, time).await);
    }

    #[tokio::test]
    async fn cancelled_booking_frees_the_master() {
        let store = Arc::new(InMemoryBookingStore::new());
        let id = store.insert(booking("anna", "14:00")).await.expect("insert");
        store.cancel(id).await.expect("cancel");
        let resolver = AvailabilityResolver::new(store);
        let (date, time) = slot();

        let free = resolver.available(&[master("anna")], date, time).await;

        assert_eq!(free.len(), 1);
    }

    #[tokio::test]
    async fn read_failure_reports_nobody_free() {
        let store = Arc::new(InMemoryBookingStore::new());
        store.set_offline(true);
        let resolver = AvailabilityResolver::new(store);
        let (date, time) = slot();

        assert!(resolver.available(&[master("anna")], date, time).await.is_empty());
    }
}
