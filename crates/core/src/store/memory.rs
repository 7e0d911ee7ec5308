use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::booking::{Booking, BookingFilter, BookingId, BookingStatus, NewBooking};
use crate::domain::catalog::{Master, Package};
use crate::errors::StoreError;

use super::{BookingStore, CatalogStore};

#[derive(Default)]
struct BookingTable {
    rows: BTreeMap<BookingId, Booking>,
    last_id: i64,
}

/// Booking rows behind a single write lock; conflict detection and insert
/// happen under the same guard.
#[derive(Default)]
pub struct InMemoryBookingStore {
    table: RwLock<BookingTable>,
    offline: AtomicBool,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with [`StoreError::Unavailable`] until reset.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: NewBooking) -> Result<BookingId, StoreError> {
        self.ensure_online()?;
        let mut table = self.table.write().await;

        let taken = table.rows.values().any(|row| {
            row.status == BookingStatus::Booked
                && row.date == booking.date
                && row.time == booking.time
                && row.master_id == booking.master_id
        });
        if taken {
            return Err(StoreError::SlotTaken {
                date: booking.date,
                time: booking.time,
                master_id: booking.master_id,
            });
        }

        table.last_id += 1;
        let id = BookingId(table.last_id);
        table.rows.insert(id, booking.into_booking(id));
        Ok(id)
    }

    async fn find(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        self.ensure_online()?;
        let table = self.table.read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn list(&self, filter: BookingFilter) -> Result<Vec<Booking>, StoreError> {
        self.ensure_online()?;
        let table = self.table.read().await;
        let matching = table.rows.values().rev().filter(|row| filter.matches(row)).cloned();
        Ok(match filter.limit {
            Some(limit) => matching.take(limit as usize).collect(),
            None => matching.collect(),
        })
    }

    async fn cancel(&self, id: BookingId) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut table = self.table.write().await;
        let row = table.rows.get_mut(&id).ok_or_else(|| StoreError::NotFound(format!("booking {id}")))?;
        row.status = BookingStatus::Cancelled;
        row.user_id = None;
        row.username = None;
        row.client_name = None;
        row.client_phone = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCatalogStore {
    packages: RwLock<Vec<Package>>,
    masters: RwLock<Vec<Master>>,
}

impl InMemoryCatalogStore {
    pub fn new(packages: Vec<Package>, masters: Vec<Master>) -> Self {
        Self { packages: RwLock::new(packages), masters: RwLock::new(masters) }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn load_packages(&self) -> Result<Vec<Package>, StoreError> {
        Ok(self.packages.read().await.clone())
    }

    async fn load_masters(&self) -> Result<Vec<Master>, StoreError> {
        Ok(self.masters.read().await.clone())
    }

    async fn insert_master(&self, master: Master) -> Result<(), StoreError> {
        let mut masters = self.masters.write().await;
        if masters.iter().any(|existing| existing.id == master.id) {
            return Err(StoreError::Unavailable(format!("master `{}` already stored", master.id)));
        }
        masters.push(master);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::booking::{BookingFilter, BookingId, BookingStatus, NewBooking};
    use crate::domain::catalog::{Gender, MasterId};
    use crate::domain::client::ClientId;
    use crate::errors::StoreError;
    use crate::store::{BookingStore, InMemoryBookingStore};

    fn new_booking(master: &str, user: i64) -> NewBooking {
        NewBooking {
            date: "2025-03-10".to_owned(),
            time: "14:00".to_owned(),
            gender: Gender::Male,
            master_id: MasterId(master.to_owned()),
            master_name: master.to_owned(),
            user_id: ClientId(user),
            username: Some(format!("user{user}")),
            client_name: Some("Ivan".to_owned()),
            client_phone: Some("+79990000000".to_owned()),
            package_name: Some("Комплексная".to_owned()),
            booked_at: "2025-03-01 10:00:00".to_owned(),
            source: "bot".to_owned(),
        }
    }

    #[tokio::test]
    async fn second_insert_for_same_slot_is_rejected() {
        let store = InMemoryBookingStore::new();

        let first = store.insert(new_booking("anna", 1)).await.expect("first insert");
        let second = store.insert(new_booking("anna", 2)).await;
        let other_master = store.insert(new_booking("olga", 2)).await.expect("other master");

        assert_eq!(first, BookingId(1));
        assert!(matches!(second, Err(StoreError::SlotTaken { .. })));
        assert_eq!(other_master, BookingId(2));
    }

    #[tokio::test]
    async fn cancel_keeps_row_and_frees_the_slot() {
        let store = InMemoryBookingStore::new();
        let id = store.insert(new_booking("anna", 1)).await.expect("insert");

        store.cancel(id).await.expect("cancel");

        let row = store.find(id).await.expect("find").expect("row kept");
        assert_eq!(row.status, BookingStatus::Cancelled);
        assert_eq!(row.user_id, None);
        assert_eq!(row.client_phone, None);
        store.insert(new_booking("anna", 2)).await.expect("slot is free again");
    }

    #[tokio::test]
    async fn list_is_newest_first_and_respects_limit() {
        let store = InMemoryBookingStore::new();
        store.insert(new_booking("anna", 1)).await.expect("insert");
        store.insert(new_booking("olga", 1)).await.expect("insert");
        store.insert(new_booking("vera", 2)).await.expect("insert");

        let mine = store.list(BookingFilter::booked().for_user(ClientId(1))).await.expect("list");
        let recent = store.list(BookingFilter::default().limit(2)).await.expect("list");

        assert_eq!(mine.iter().map(|b| b.id.0).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(recent.iter().map(|b| b.id.0).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = InMemoryBookingStore::new();
        store.set_offline(true);

        assert!(matches!(store.list(BookingFilter::booked()).await, Err(StoreError::Unavailable(_))));
        assert!(store.insert(new_booking("anna", 1)).await.is_err());
    }
}
