//! WebSocket transport
//!
//! [`TelemetryServer`] accepts TCP connections and upgrades them to WebSocket;
//! each [`Connection`] task decodes frames into session events and writes
//! fanned-out updates back to its client.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use connection::Connection;
pub use listener::TelemetryServer;
