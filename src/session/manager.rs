//! Session manager
//!
//! The single owner of all real-time state: live connections, their journey
//! buffers and the subscription registry. Every method takes `&mut self` and
//! runs to completion, so callers must serialize events through one task (see
//! [`SessionDispatcher`](super::SessionDispatcher)).
//!
//! # Lifecycle
//!
//! ```text
//! on_connect ──► on_subscribe / on_unsubscribe ──► on_telemetry* ──► on_disconnect
//!                                                      │                   │
//!                                           checkpoint at cap      finalize + submit
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::config::SessionConfig;
use super::connection::{ConnectionHandle, ConnectionId, Delivery};
use super::state::ConnectionState;
use crate::journey::{CompletedJourney, DiscardReason, JourneyBuffer};
use crate::protocol::encode_telemetry_update;
use crate::registry::SubscriptionRegistry;
use crate::stats::ServerStats;
use crate::store::{JourneyBackend, JourneyPersister, PersistOutcome};
use crate::telemetry::TelemetrySample;

/// What happened to a connection's journey when it closed
#[derive(Debug)]
pub enum DisconnectOutcome {
    /// No live connection had this id
    Unknown,
    /// Nothing worth persisting was collected
    Discarded(DiscardReason),
    /// Journey handed to the persister
    Submitted(JoinHandle<PersistOutcome>),
}

/// Owner of connections, journey buffers and subscriptions
pub struct SessionManager<B> {
    config: SessionConfig,
    connections: HashMap<ConnectionId, ConnectionState>,
    registry: SubscriptionRegistry,
    persister: JourneyPersister<B>,
    stats: ServerStats,
    started_at: Instant,
}

impl<B: JourneyBackend> SessionManager<B> {
    /// Create a manager persisting journeys to `backend`
    pub fn new(config: SessionConfig, backend: Arc<B>) -> Self {
        let persister = JourneyPersister::new(backend)
            .with_save_attempts(config.save_attempts, config.retry_backoff);

        Self {
            config,
            connections: HashMap::new(),
            registry: SubscriptionRegistry::new(),
            persister,
            stats: ServerStats::new(),
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Register a new connection with an empty journey buffer
    ///
    /// A duplicate id is logged and ignored; returns false in that case.
    pub fn on_connect(&mut self, handle: ConnectionHandle) -> bool {
        let id = handle.id();
        match self.connections.entry(id) {
            Entry::Occupied(_) => {
                tracing::warn!(connection_id = %id, "Duplicate connection id ignored");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(ConnectionState::new(handle));
                self.stats.total_connections += 1;
                tracing::info!(
                    connection_id = %id,
                    active = self.connections.len(),
                    "Connection registered"
                );
                true
            }
        }
    }

    /// Watch `vin`, leaving any vehicle watched before
    ///
    /// Returns true if the subscription changed.
    pub fn on_subscribe(&mut self, id: ConnectionId, vin: &str) -> bool {
        if vin.is_empty() {
            tracing::debug!(connection_id = %id, "Subscribe without vehicle identifier ignored");
            return false;
        }

        let Some(state) = self.connections.get_mut(&id) else {
            tracing::debug!(connection_id = %id, "Subscribe from unknown connection ignored");
            return false;
        };

        if state.is_watching(vin) {
            return false;
        }

        if let Some(previous) = state.watch(vin) {
            self.registry.remove(&previous, id);
            tracing::debug!(connection_id = %id, vin = %previous, "Left previous vehicle");
        }
        self.registry.add(vin, id);

        tracing::info!(connection_id = %id, vin = %vin, "Subscribed to vehicle");
        true
    }

    /// Stop watching the current vehicle
    pub fn on_unsubscribe(&mut self, id: ConnectionId) -> bool {
        let Some(vin) = self.connections.get_mut(&id).and_then(ConnectionState::unwatch) else {
            return false;
        };

        self.registry.remove(&vin, id);
        tracing::info!(connection_id = %id, vin = %vin, "Unsubscribed from vehicle");
        true
    }

    /// Ingest a sample from `id` and fan it out to the sample's vehicle
    ///
    /// Returns the number of subscribers the update was queued for.
    pub fn on_telemetry(&mut self, id: ConnectionId, sample: TelemetrySample) -> usize {
        let Some(vin) = sample.vin() else {
            self.stats.samples_dropped += 1;
            tracing::trace!(connection_id = %id, "Sample without vehicle identifier dropped");
            return 0;
        };

        let Some(state) = self.connections.get_mut(&id) else {
            tracing::debug!(connection_id = %id, "Sample from unknown connection ignored");
            return 0;
        };

        state.buffer.record(&sample);
        self.stats.samples_received += 1;

        let cap = self.config.max_journey_samples;
        let checkpoint = if cap > 0 && state.buffer.len() >= cap {
            state.buffer.checkpoint()
        } else {
            None
        };

        if let Some(journey) = checkpoint {
            self.stats.checkpoints += 1;
            tracing::info!(
                connection_id = %id,
                vin = %journey.vin,
                samples = journey.sample_count(),
                "Journey checkpointed"
            );
            self.submit(journey);
        }

        self.fan_out(vin, &sample.payload)
    }

    /// Close a connection: finalize its journey and drop its subscription
    pub fn on_disconnect(&mut self, id: ConnectionId) -> DisconnectOutcome {
        let Some(mut state) = self.connections.remove(&id) else {
            tracing::debug!(connection_id = %id, "Disconnect for unknown connection");
            return DisconnectOutcome::Unknown;
        };

        if let Some(vin) = state.unwatch() {
            self.registry.remove(&vin, id);
        }

        let duration = state.duration();
        match state.buffer.finalize(Utc::now()) {
            Ok(journey) => {
                tracing::info!(
                    connection_id = %id,
                    vin = %journey.vin,
                    samples = journey.sample_count(),
                    duration_ms = duration.as_millis() as u64,
                    "Connection closed, journey submitted"
                );
                DisconnectOutcome::Submitted(self.submit(journey))
            }
            Err(reason) => {
                self.stats.journeys_discarded += 1;
                tracing::debug!(
                    connection_id = %id,
                    reason = %reason,
                    "Connection closed, nothing to persist"
                );
                DisconnectOutcome::Discarded(reason)
            }
        }
    }

    /// Disconnect every live connection
    ///
    /// Returns the persistence tasks for the journeys that were submitted.
    pub fn shutdown(&mut self) -> Vec<JoinHandle<PersistOutcome>> {
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        tracing::info!(connections = ids.len(), "Closing all sessions");

        ids.into_iter()
            .filter_map(|id| match self.on_disconnect(id) {
                DisconnectOutcome::Submitted(handle) => Some(handle),
                _ => None,
            })
            .collect()
    }

    /// Journey buffer of a live connection
    pub fn buffer(&self, id: ConnectionId) -> Option<&JourneyBuffer> {
        self.connections.get(&id).map(|state| &state.buffer)
    }

    /// Vehicle a live connection watches
    pub fn subscribed_vehicle(&self, id: ConnectionId) -> Option<&str> {
        self.connections.get(&id)?.vehicle.as_deref()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn persister(&self) -> &JourneyPersister<B> {
        &self.persister
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            active_connections: self.connections.len() as u64,
            active_vehicles: self.registry.vehicle_count() as u64,
            uptime: self.started_at.elapsed(),
            ..self.stats.clone()
        }
        .with_persistence(self.persister.stats())
    }

    fn submit(&mut self, journey: CompletedJourney) -> JoinHandle<PersistOutcome> {
        self.stats.journeys_submitted += 1;
        self.persister.submit(journey)
    }

    fn fan_out(&mut self, vin: &str, payload: &Value) -> usize {
        if !self.registry.has_vehicle(vin) {
            return 0;
        }

        let frame = match encode_telemetry_update(payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(vin = %vin, error = %e, "Failed to encode telemetry update");
                return 0;
            }
        };

        let mut delivered = 0;
        for subscriber in self.registry.subscribers(vin) {
            let Some(state) = self.connections.get(&subscriber) else {
                continue;
            };

            match state.handle.deliver(frame.clone()) {
                Delivery::Queued => delivered += 1,
                Delivery::Full => {
                    self.stats.updates_dropped += 1;
                    tracing::debug!(
                        connection_id = %subscriber,
                        vin = %vin,
                        "Outbound queue full, update dropped"
                    );
                }
                Delivery::Closed => {}
            }
        }

        self.stats.updates_delivered += delivered as u64;
        delivered
    }
}
