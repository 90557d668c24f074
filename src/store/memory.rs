//! In-memory backend
//!
//! Keeps the vehicle directory in a `HashMap` and saved journeys in a `Vec`,
//! both behind `tokio::sync::RwLock`. Nothing survives a restart. Used by the
//! tests and by the demo server when no database is configured.
//!
//! The store can be switched into a failing mode to exercise the best-effort
//! persistence paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Notify, RwLock};

use super::{InternalVehicleId, JourneyStore, StoreError, StoreResult, VehicleDirectory};
use crate::journey::PersistedJourney;

/// Volatile vehicle directory and journey sink
#[derive(Debug, Default)]
pub struct InMemoryStore {
    vehicles: RwLock<HashMap<String, InternalVehicleId>>,
    journeys: RwLock<Vec<PersistedJourney>>,
    fail_lookups: AtomicBool,
    fail_saves: AtomicBool,
    save_calls: AtomicU64,
    saved: Notify,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a VIN under an internal id
    pub async fn register_vehicle(&self, vin: impl Into<String>, id: InternalVehicleId) {
        self.vehicles.write().await.insert(vin.into(), id);
    }

    /// Make directory lookups fail
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::Relaxed);
    }

    /// Make journey saves fail
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }

    /// Saved journeys, in save order
    pub async fn journeys(&self) -> Vec<PersistedJourney> {
        self.journeys.read().await.clone()
    }

    /// Number of `save_journey` calls, including failed ones
    pub fn save_calls(&self) -> u64 {
        self.save_calls.load(Ordering::Relaxed)
    }

    /// Wait until at least `count` journeys have been saved
    pub async fn wait_for_journeys(&self, count: usize) -> Vec<PersistedJourney> {
        loop {
            let notified = self.saved.notified();
            {
                let journeys = self.journeys.read().await;
                if journeys.len() >= count {
                    return journeys.clone();
                }
            }
            notified.await;
        }
    }
}

impl VehicleDirectory for InMemoryStore {
    async fn resolve_internal_id(&self, vin: &str) -> StoreResult<Option<InternalVehicleId>> {
        if self.fail_lookups.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("directory offline".into()));
        }
        Ok(self.vehicles.read().await.get(vin).copied())
    }
}

impl JourneyStore for InMemoryStore {
    async fn save_journey(&self, journey: &PersistedJourney) -> StoreResult<()> {
        self.save_calls.fetch_add(1, Ordering::Relaxed);

        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("journey sink offline".into()));
        }

        self.journeys.write().await.push(journey.clone());
        self.saved.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journey::JourneyTimestamp;

    fn journey(vehicle_id: InternalVehicleId) -> PersistedJourney {
        let now = JourneyTimestamp::now();
        PersistedJourney {
            vehicle_id,
            vin: "VIN1".into(),
            started_at: now,
            ended_at: now,
            dataset: "{}".into(),
            speed_series: "[]".into(),
            fuel_series: "[]".into(),
        }
    }

    #[tokio::test]
    async fn test_resolve_registered_vehicle() {
        let store = InMemoryStore::new();
        store.register_vehicle("VIN1", 7).await;

        assert_eq!(store.resolve_internal_id("VIN1").await.unwrap(), Some(7));
        assert_eq!(store.resolve_internal_id("VIN2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_and_list() {
        let store = InMemoryStore::new();
        tokio_test::assert_ok!(store.save_journey(&journey(1)).await);
        tokio_test::assert_ok!(store.save_journey(&journey(2)).await);

        let saved = store.journeys().await;
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].vehicle_id, 1);
        assert_eq!(saved[1].vehicle_id, 2);
        assert_eq!(store.save_calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_modes() {
        let store = InMemoryStore::new();
        store.register_vehicle("VIN1", 7).await;

        store.fail_lookups(true);
        assert!(store.resolve_internal_id("VIN1").await.is_err());

        store.fail_saves(true);
        tokio_test::assert_err!(store.save_journey(&journey(7)).await);
        assert!(store.journeys().await.is_empty());
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_journeys() {
        let store = std::sync::Arc::new(InMemoryStore::new());

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_for_journeys(1).await })
        };

        tokio::task::yield_now().await;
        store.save_journey(&journey(3)).await.unwrap();

        let saved = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved[0].vehicle_id, 3);
    }
}
