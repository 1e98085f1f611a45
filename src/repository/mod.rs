//! Repository layer: the storage contract the scheduler relies on, with a
//! PostgreSQL backend and an in-memory one.

pub mod availability;
pub mod bookings;
pub mod directory;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::ServiceSpec,
    scheduling::{Booking, ProviderAvailability, TimeInterval},
};

/// Storage failure, classified for retry decisions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness or exclusion rule rejected the write
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record changed since it was read
    #[error("version mismatch")]
    VersionMismatch,

    /// Worth retrying (serialization failure, deadlock, pool exhaustion, I/O)
    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("storage failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                // exclusion_violation, unique_violation
                Some("23P01") | Some("23505") => StoreError::Conflict(db.message().to_string()),
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => StoreError::Transient(db.message().to_string()),
                _ => StoreError::Backend(err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
                StoreError::Transient(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Store a freshly registered provider; `Conflict` if it exists
    async fn create(&self, availability: &ProviderAvailability) -> StoreResult<()>;

    async fn load(&self, provider_id: Uuid) -> StoreResult<Option<ProviderAvailability>>;

    /// Replace the aggregate if its stored version still equals
    /// `availability.version`; returns the new version
    async fn save(&self, availability: &ProviderAvailability) -> StoreResult<i64>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    /// Bookings of `staff_id` that hold time and overlap `window`, by start
    async fn overlapping(&self, staff_id: Uuid, window: TimeInterval) -> StoreResult<Vec<Booking>>;

    async fn insert(&self, booking: &Booking) -> StoreResult<()>;

    /// Write `booking` if the stored version is `booking.version - 1`
    async fn update(&self, booking: &Booking) -> StoreResult<()>;
}

/// Read side of the service catalog
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn get_service(&self, service_id: Uuid) -> StoreResult<Option<ServiceSpec>>;
}

/// Read side of the staff directory
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    async fn list_staff(&self, provider_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn get_staff_time_off(&self, staff_id: Uuid, window: TimeInterval) -> StoreResult<Vec<TimeInterval>>;
}

/// Main repository struct holding the storage backends
#[derive(Clone)]
pub struct Repository {
    pub availability: Arc<dyn AvailabilityStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub catalog: Arc<dyn ServiceCatalog>,
    pub staff: Arc<dyn StaffDirectory>,
}

impl Repository {
    /// Create a repository backed by PostgreSQL
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        let directory = Arc::new(directory::DirectoryRepository::new(pool.clone()));
        Self {
            availability: Arc::new(availability::AvailabilityRepository::new(pool.clone())),
            bookings: Arc::new(bookings::BookingsRepository::new(pool)),
            catalog: directory.clone(),
            staff: directory,
        }
    }

    /// Create a repository over one shared in-memory store
    pub fn in_memory(store: memory::MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            availability: store.clone(),
            bookings: store.clone(),
            catalog: store.clone(),
            staff: store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Transient(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }
}
