use thiserror::Error;

use crate::domain::catalog::MasterId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("master `{0}` already exists")]
    DuplicateMaster(MasterId),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure at the catalog/booking store boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("slot {date} {time} is already booked for master `{master_id}`")]
    SlotTaken { date: String, time: String, master_id: MasterId },
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::SlotTaken { .. })
    }
}
