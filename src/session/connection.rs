//! Connection identity and outbound delivery handle

use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Opaque connection id, unique for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of handing a frame to a connection's outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Frame queued
    Queued,
    /// Queue full, frame dropped for this connection only
    Full,
    /// Writer gone, the connection is tearing down
    Closed,
}

/// Sending half of a connection's bounded outbound queue
///
/// Delivery never waits: a viewer that cannot keep up loses updates instead of
/// stalling fan-out for everyone else.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Bytes>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Bytes>) -> Self {
        Self { id, tx }
    }

    /// Create a handle together with the receiving half of its queue
    pub fn channel(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an encoded frame without waiting
    pub fn deliver(&self, frame: Bytes) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(42).to_string(), "42");
        assert_eq!(ConnectionId::new(42).get(), 42);
    }

    #[tokio::test]
    async fn test_deliver_queues_frame() {
        let (handle, mut rx) = ConnectionHandle::channel(ConnectionId::new(1), 4);

        assert_eq!(handle.deliver(Bytes::from_static(b"one")), Delivery::Queued);

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"one"));
    }

    #[tokio::test]
    async fn test_deliver_full_queue() {
        let (handle, _rx) = ConnectionHandle::channel(ConnectionId::new(1), 1);

        assert_eq!(handle.deliver(Bytes::from_static(b"a")), Delivery::Queued);
        assert_eq!(handle.deliver(Bytes::from_static(b"b")), Delivery::Full);
    }

    #[tokio::test]
    async fn test_deliver_closed_queue() {
        let (handle, rx) = ConnectionHandle::channel(ConnectionId::new(1), 1);
        drop(rx);

        assert!(handle.is_closed());
        assert_eq!(handle.deliver(Bytes::from_static(b"a")), Delivery::Closed);
    }
}
