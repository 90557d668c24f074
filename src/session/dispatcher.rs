//! Session dispatcher
//!
//! One task owns the [`SessionManager`] and applies events to it in the order
//! they arrive. Connection tasks reach it only through a cloneable
//! [`SessionHandle`].

use futures_util::future::join_all;
use tokio::sync::{mpsc, oneshot};

use super::connection::{ConnectionHandle, ConnectionId};
use super::manager::SessionManager;
use crate::error::{Error, Result};
use crate::stats::ServerStats;
use crate::store::JourneyBackend;
use crate::telemetry::TelemetrySample;

/// Events applied to the session manager
#[derive(Debug)]
pub enum SessionEvent {
    Connect(ConnectionHandle),
    Subscribe { id: ConnectionId, vin: String },
    Unsubscribe { id: ConnectionId },
    Telemetry { id: ConnectionId, sample: TelemetrySample },
    Disconnect { id: ConnectionId },
    Stats { reply: oneshot::Sender<ServerStats> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Cloneable sender of [`SessionEvent`]s
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    fn send(&self, event: SessionEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| Error::DispatcherClosed)
    }

    pub fn connect(&self, handle: ConnectionHandle) -> Result<()> {
        self.send(SessionEvent::Connect(handle))
    }

    pub fn subscribe(&self, id: ConnectionId, vin: impl Into<String>) -> Result<()> {
        self.send(SessionEvent::Subscribe {
            id,
            vin: vin.into(),
        })
    }

    pub fn unsubscribe(&self, id: ConnectionId) -> Result<()> {
        self.send(SessionEvent::Unsubscribe { id })
    }

    pub fn telemetry(&self, id: ConnectionId, sample: TelemetrySample) -> Result<()> {
        self.send(SessionEvent::Telemetry { id, sample })
    }

    pub fn disconnect(&self, id: ConnectionId) -> Result<()> {
        self.send(SessionEvent::Disconnect { id })
    }

    /// Snapshot of the session counters
    pub async fn stats(&self) -> Result<ServerStats> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Stats { reply })?;
        rx.await.map_err(|_| Error::DispatcherClosed)
    }

    /// Close every session and stop the dispatcher
    ///
    /// Resolves once pending journeys are saved or the flush timeout passes.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Shutdown { reply })?;
        rx.await.map_err(|_| Error::DispatcherClosed)
    }

    /// Whether the dispatcher has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Event loop driving a [`SessionManager`]
pub struct SessionDispatcher<B> {
    manager: SessionManager<B>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<B: JourneyBackend> SessionDispatcher<B> {
    /// Create a dispatcher and the handle that feeds it
    pub fn new(manager: SessionManager<B>) -> (Self, SessionHandle) {
        let (tx, events) = mpsc::unbounded_channel();
        (Self { manager, events }, SessionHandle { tx })
    }

    /// Apply events until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::debug!("Session dispatcher started");

        while let Some(event) = self.events.recv().await {
            match event {
                SessionEvent::Connect(handle) => {
                    self.manager.on_connect(handle);
                }
                SessionEvent::Subscribe { id, vin } => {
                    self.manager.on_subscribe(id, &vin);
                }
                SessionEvent::Unsubscribe { id } => {
                    self.manager.on_unsubscribe(id);
                }
                SessionEvent::Telemetry { id, sample } => {
                    self.manager.on_telemetry(id, sample);
                }
                SessionEvent::Disconnect { id } => {
                    self.manager.on_disconnect(id);
                }
                SessionEvent::Stats { reply } => {
                    let _ = reply.send(self.manager.stats());
                }
                SessionEvent::Shutdown { reply } => {
                    self.events.close();
                    self.flush().await;
                    let _ = reply.send(());
                    tracing::debug!("Session dispatcher stopped");
                    return;
                }
            }
        }

        self.flush().await;
        tracing::debug!("Session dispatcher stopped, all handles dropped");
    }

    async fn flush(&mut self) {
        let pending = self.manager.shutdown();
        if pending.is_empty() {
            return;
        }

        let timeout = self.manager.config().shutdown_flush_timeout;
        let count = pending.len();
        match tokio::time::timeout(timeout, join_all(pending)).await {
            Ok(_) => tracing::info!(journeys = count, "Pending journeys flushed"),
            Err(_) => tracing::warn!(
                journeys = count,
                timeout_ms = timeout.as_millis() as u64,
                "Shutdown flush timed out"
            ),
        }
    }
}

/// Spawn a dispatcher on the current runtime
pub fn spawn<B: JourneyBackend>(
    manager: SessionManager<B>,
) -> (SessionHandle, tokio::task::JoinHandle<()>) {
    let (dispatcher, handle) = SessionDispatcher::new(manager);
    (handle, tokio::spawn(dispatcher.run()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::session::SessionConfig;
    use crate::store::InMemoryStore;

    const TEST_WAIT: Duration = Duration::from_secs(2);

    fn start(store: &Arc<InMemoryStore>) -> (SessionHandle, tokio::task::JoinHandle<()>) {
        spawn(SessionManager::new(SessionConfig::default(), Arc::clone(store)))
    }

    #[tokio::test]
    async fn test_events_applied_in_order() {
        let store = Arc::new(InMemoryStore::new());
        let (sessions, _task) = start(&store);

        let viewer = ConnectionId::new(1);
        let (handle, mut rx) = ConnectionHandle::channel(viewer, 8);
        sessions.connect(handle).unwrap();
        sessions.subscribe(viewer, "VIN1").unwrap();

        let device = ConnectionId::new(2);
        let (handle, _device_rx) = ConnectionHandle::channel(device, 8);
        sessions.connect(handle).unwrap();
        for speed in [1, 2, 3] {
            let sample = TelemetrySample::received_now(json!({"vin": "VIN1", "vehicleSpeed": speed}));
            sessions.telemetry(device, sample).unwrap();
        }

        for expected in [1, 2, 3] {
            let frame = tokio::time::timeout(TEST_WAIT, rx.recv()).await.unwrap().unwrap();
            let update: serde_json::Value = serde_json::from_slice(&frame).unwrap();
            assert_eq!(update["data"]["vehicleSpeed"], expected);
        }

        let stats = sessions.stats().await.unwrap();
        assert_eq!(stats.active_connections, 2);
        assert_eq!(stats.active_vehicles, 1);
        assert_eq!(stats.samples_received, 3);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_journeys() {
        let store = Arc::new(InMemoryStore::new());
        store.register_vehicle("VIN1", 5).await;
        let (sessions, task) = start(&store);

        let id = ConnectionId::new(1);
        let (handle, mut rx) = ConnectionHandle::channel(id, 8);
        sessions.connect(handle).unwrap();
        sessions
            .telemetry(id, TelemetrySample::received_now(json!({"vin": "VIN1"})))
            .unwrap();

        tokio::time::timeout(TEST_WAIT, sessions.shutdown())
            .await
            .unwrap()
            .unwrap();
        task.await.unwrap();

        assert_eq!(store.journeys().await.len(), 1);
        // Outbound queue closed with the session
        assert!(rx.recv().await.is_none());
        assert!(sessions.is_closed());
        assert!(matches!(
            sessions.disconnect(id),
            Err(Error::DispatcherClosed)
        ));
    }

    #[tokio::test]
    async fn test_dropping_handles_stops_dispatcher() {
        let store = Arc::new(InMemoryStore::new());
        store.register_vehicle("VIN1", 5).await;
        let (sessions, task) = start(&store);

        let id = ConnectionId::new(1);
        let (handle, _rx) = ConnectionHandle::channel(id, 8);
        sessions.connect(handle).unwrap();
        sessions
            .telemetry(id, TelemetrySample::received_now(json!({"vin": "VIN1"})))
            .unwrap();
        drop(sessions);

        tokio::time::timeout(TEST_WAIT, task).await.unwrap().unwrap();
        assert_eq!(store.journeys().await.len(), 1);
    }
}
