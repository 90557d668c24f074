//! Best-effort journey persistence
//!
//! Each finalized journey is handled by its own spawned task: resolve the VIN,
//! serialize the datasets, save. The task never touches session state, so it
//! is safe for the originating connection to be long gone by the time it runs.
//! Failures are logged and counted, never propagated to the transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{JourneyBackend, StoreError};
use crate::journey::CompletedJourney;

/// Result of one persistence attempt
#[derive(Debug)]
pub enum PersistOutcome {
    /// Journey stored under the resolved vehicle id
    Saved { vehicle_id: i64 },
    /// The directory has no vehicle for this VIN
    UnknownVehicle,
    /// Lookup, serialization or save failed
    Failed(StoreError),
}

impl PersistOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, PersistOutcome::Saved { .. })
    }
}

/// Counters shared with the persistence tasks
#[derive(Debug, Default)]
pub struct PersistStats {
    saved: AtomicU64,
    unknown_vehicle: AtomicU64,
    failed: AtomicU64,
}

impl PersistStats {
    pub fn saved(&self) -> u64 {
        self.saved.load(Ordering::Relaxed)
    }

    pub fn unknown_vehicle(&self) -> u64 {
        self.unknown_vehicle.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: &PersistOutcome) {
        let counter = match outcome {
            PersistOutcome::Saved { .. } => &self.saved,
            PersistOutcome::UnknownVehicle => &self.unknown_vehicle,
            PersistOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Spawns persistence tasks against a backend
pub struct JourneyPersister<B> {
    backend: Arc<B>,
    save_attempts: u32,
    retry_backoff: Duration,
    stats: Arc<PersistStats>,
}

impl<B> Clone for JourneyPersister<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            save_attempts: self.save_attempts,
            retry_backoff: self.retry_backoff,
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<B: JourneyBackend> JourneyPersister<B> {
    /// Create a persister that tries each save once
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            save_attempts: 1,
            retry_backoff: Duration::from_millis(250),
            stats: Arc::new(PersistStats::default()),
        }
    }

    /// Allow up to `attempts` saves per journey (minimum 1)
    pub fn with_save_attempts(mut self, attempts: u32, backoff: Duration) -> Self {
        self.save_attempts = attempts.max(1);
        self.retry_backoff = backoff;
        self
    }

    /// Shared counters
    pub fn stats(&self) -> &Arc<PersistStats> {
        &self.stats
    }

    /// Backend handle
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Hand a journey off to a background task
    pub fn submit(&self, journey: CompletedJourney) -> JoinHandle<PersistOutcome> {
        let persister = self.clone();
        tokio::spawn(async move {
            let outcome = persister.persist(journey).await;
            persister.stats.record(&outcome);
            outcome
        })
    }

    async fn persist(&self, journey: CompletedJourney) -> PersistOutcome {
        let vin = journey.vin.clone();

        let vehicle_id = match self.backend.resolve_internal_id(&vin).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::warn!(vin = %vin, "No registered vehicle for VIN, journey discarded");
                return PersistOutcome::UnknownVehicle;
            }
            Err(e) => {
                tracing::error!(vin = %vin, error = %e, "Vehicle lookup failed, journey discarded");
                return PersistOutcome::Failed(e);
            }
        };

        let samples = journey.sample_count();
        let record = match journey.into_persisted(vehicle_id) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(vin = %vin, error = %e, "Journey serialization failed");
                return PersistOutcome::Failed(e.into());
            }
        };

        let mut attempt = 1;
        loop {
            match self.backend.save_journey(&record).await {
                Ok(()) => {
                    tracing::info!(
                        vin = %vin,
                        vehicle_id = vehicle_id,
                        samples = samples,
                        start = %record.started_at,
                        end = %record.ended_at,
                        "Journey saved"
                    );
                    return PersistOutcome::Saved { vehicle_id };
                }
                Err(e) if attempt < self.save_attempts => {
                    tracing::warn!(
                        vin = %vin,
                        attempt = attempt,
                        error = %e,
                        "Journey save failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) => {
                    tracing::error!(vin = %vin, error = %e, "Journey save failed");
                    return PersistOutcome::Failed(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::journey::JourneyBuffer;
    use crate::store::InMemoryStore;
    use crate::telemetry::TelemetrySample;

    fn journey(vin: &str, samples: usize) -> CompletedJourney {
        let mut buffer = JourneyBuffer::new();
        for i in 0..samples {
            buffer.record(&TelemetrySample::received_now(
                json!({"vin": vin, "vehicleSpeed": i, "fuelLevel": 50}),
            ));
        }
        buffer.finalize(Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_saves_resolved_journey() {
        let store = Arc::new(InMemoryStore::new());
        store.register_vehicle("VIN1", 11).await;
        let persister = JourneyPersister::new(store.clone());

        let outcome = persister.submit(journey("VIN1", 3)).await.unwrap();

        assert!(matches!(outcome, PersistOutcome::Saved { vehicle_id: 11 }));
        let saved = store.journeys().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].vehicle_id, 11);
        assert_eq!(persister.stats().saved(), 1);
    }

    #[tokio::test]
    async fn test_unknown_vehicle_is_not_saved() {
        let store = Arc::new(InMemoryStore::new());
        let persister = JourneyPersister::new(store.clone());

        let outcome = persister.submit(journey("GHOST", 2)).await.unwrap();

        assert!(matches!(outcome, PersistOutcome::UnknownVehicle));
        assert_eq!(store.save_calls(), 0);
        assert_eq!(persister.stats().unknown_vehicle(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_reported() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_lookups(true);
        let persister = JourneyPersister::new(store.clone());

        let outcome = persister.submit(journey("VIN1", 1)).await.unwrap();

        assert!(matches!(outcome, PersistOutcome::Failed(StoreError::Unavailable(_))));
        assert_eq!(store.save_calls(), 0);
        assert_eq!(persister.stats().failed(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_not_retried_by_default() {
        let store = Arc::new(InMemoryStore::new());
        store.register_vehicle("VIN1", 1).await;
        store.fail_saves(true);
        let persister = JourneyPersister::new(store.clone());

        let outcome = persister.submit(journey("VIN1", 1)).await.unwrap();

        assert!(!outcome.is_saved());
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_bounded_retry() {
        let store = Arc::new(InMemoryStore::new());
        store.register_vehicle("VIN1", 1).await;
        store.fail_saves(true);
        let persister =
            JourneyPersister::new(store.clone()).with_save_attempts(3, Duration::from_millis(1));

        let outcome = persister.submit(journey("VIN1", 1)).await.unwrap();

        assert!(matches!(outcome, PersistOutcome::Failed(_)));
        assert_eq!(store.save_calls(), 3);
        assert_eq!(persister.stats().failed(), 1);
    }
}
