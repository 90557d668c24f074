//! Persistence collaborators
//!
//! The session core reaches storage through two narrow traits: a vehicle
//! directory that maps a VIN to the internal vehicle id, and a journey sink.
//! A backend implements both; [`JourneyBackend`] names the combination.

use std::future::Future;

use crate::journey::PersistedJourney;

pub mod memory;
pub mod persister;
pub mod postgres;

pub use memory::InMemoryStore;
pub use persister::{JourneyPersister, PersistOutcome, PersistStats};
pub use postgres::{PostgresConfig, PostgresStore};

/// Directory-resolved vehicle id (`registered_vehicles.unique_id`)
pub type InternalVehicleId = i64;

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Could not obtain a pooled connection
    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// Query failed
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Dataset could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid backend configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend refused the request
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// VIN → internal vehicle id lookup
pub trait VehicleDirectory: Send + Sync + 'static {
    /// Resolve a VIN. `Ok(None)` means the vehicle is not registered.
    fn resolve_internal_id(
        &self,
        vin: &str,
    ) -> impl Future<Output = StoreResult<Option<InternalVehicleId>>> + Send;
}

/// Durable journey sink
pub trait JourneyStore: Send + Sync + 'static {
    /// Store one journey
    fn save_journey(
        &self,
        journey: &PersistedJourney,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}

/// A backend usable by the session core
pub trait JourneyBackend: VehicleDirectory + JourneyStore {}

impl<T: VehicleDirectory + JourneyStore> JourneyBackend for T {}
