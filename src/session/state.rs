//! Per-connection session state
//!
//! Tracks what the session manager knows about one live connection from open
//! to close.

use std::time::{Duration, Instant};

use super::connection::ConnectionHandle;
use crate::journey::JourneyBuffer;

/// State of one live connection
#[derive(Debug)]
pub struct ConnectionState {
    /// Outbound delivery handle
    pub handle: ConnectionHandle,

    /// Vehicle currently watched, if any
    pub vehicle: Option<String>,

    /// In-progress journey for samples this connection sends
    pub buffer: JourneyBuffer,

    /// Connection start time
    pub connected_at: Instant,
}

impl ConnectionState {
    /// Create state for a freshly opened connection
    pub fn new(handle: ConnectionHandle) -> Self {
        Self {
            handle,
            vehicle: None,
            buffer: JourneyBuffer::new(),
            connected_at: Instant::now(),
        }
    }

    /// Replace the watched vehicle, returning the previous one
    pub fn watch(&mut self, vin: &str) -> Option<String> {
        self.vehicle.replace(vin.to_owned())
    }

    /// Stop watching, returning the vehicle that was watched
    pub fn unwatch(&mut self) -> Option<String> {
        self.vehicle.take()
    }

    /// Whether this connection watches `vin`
    pub fn is_watching(&self, vin: &str) -> bool {
        self.vehicle.as_deref() == Some(vin)
    }

    /// Time since the connection opened
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
