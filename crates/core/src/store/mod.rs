//! Persistence seams consumed by the booking core.
//!
//! The SQLite implementations live in `slotbook-db`; the in-memory ones here
//! back tests and single-process demos.

use async_trait::async_trait;

use crate::domain::booking::{Booking, BookingFilter, BookingId, NewBooking};
use crate::domain::catalog::{Catalog, Master, Package};
use crate::errors::StoreError;

pub mod memory;

pub use memory::{InMemoryBookingStore, InMemoryCatalogStore};

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a `booked` row. Must fail with [`StoreError::SlotTaken`] when
    /// another `booked` row exists for the same date, time and master.
    async fn insert(&self, booking: NewBooking) -> Result<BookingId, StoreError>;
    async fn find(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;
    /// Rows matching `filter`, newest id first.
    async fn list(&self, filter: BookingFilter) -> Result<Vec<Booking>, StoreError>;
    /// Flips status to cancelled and clears client-identifying fields.
    async fn cancel(&self, id: BookingId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn load_packages(&self) -> Result<Vec<Package>, StoreError>;
    async fn load_masters(&self) -> Result<Vec<Master>, StoreError>;
    async fn insert_master(&self, master: Master) -> Result<(), StoreError>;
}

/// Reads both catalog tables into a snapshot. Failure here is startup-fatal.
pub async fn load_catalog(store: &dyn CatalogStore) -> Result<Catalog, StoreError> {
    let packages = store.load_packages().await?;
    let masters = store.load_masters().await?;
    Ok(Catalog::new(packages, masters))
}
