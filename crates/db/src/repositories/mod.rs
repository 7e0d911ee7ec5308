use thiserror::Error;

use slotbook_core::errors::StoreError;

pub mod booking;
pub mod catalog;

pub use booking::SqlBookingStore;
pub use catalog::SqlCatalogStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(error)) => error.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        StoreError::Unavailable(error.to_string())
    }
}

fn decode<T, E: std::fmt::Display>(result: Result<T, E>) -> Result<T, RepositoryError> {
    result.map_err(|error| RepositoryError::Decode(error.to_string()))
}
