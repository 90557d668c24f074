//! Real-time OBD telemetry relay
//!
//! Accepts long-lived WebSocket connections from vehicle reporting devices and
//! dashboards. Devices stream telemetry samples; dashboards subscribe to a
//! vehicle identifier and receive those samples live. When a connection closes,
//! the samples it contributed are turned into a journey record and handed to a
//! persistence backend.
//!
//! # Architecture
//!
//! ```text
//!   [Device]            [Dashboard]           [Dashboard]
//!      │ telemetry          │ subscribe           │ subscribe
//!      ▼                    ▼                     ▼
//!   Connection ───────► SessionHandle ◄────── Connection
//!                           │ SessionEvent (mpsc, FIFO)
//!                           ▼
//!                   SessionDispatcher (single task)
//!                           │
//!                           ▼
//!                     SessionManager ──► SubscriptionRegistry
//!                      │        │
//!           JourneyBuffer    JourneyPersister ──► VehicleDirectory + JourneyStore
//! ```
//!
//! All real-time state lives in one [`SessionManager`] driven by one dispatcher
//! task, so the registry and buffers need no locks. Persistence runs in spawned
//! tasks and never blocks dispatch.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use obd_relay::store::InMemoryStore;
//! use obd_relay::{ServerConfig, SessionConfig, TelemetryServer};
//!
//! # async fn example() -> obd_relay::Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! store.register_vehicle("1HGCM82633A004352", 7).await;
//!
//! let server = TelemetryServer::new(ServerConfig::default(), SessionConfig::default(), store);
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

pub mod error;
pub mod journey;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod store;
pub mod telemetry;

pub use error::{Error, Result};
pub use server::{ServerConfig, TelemetryServer};
pub use session::{SessionConfig, SessionHandle, SessionManager};
pub use telemetry::TelemetrySample;
