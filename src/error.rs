//! Crate-level error type

/// Errors surfaced by the transport and session layers
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or listener failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// WebSocket handshake did not complete within the configured timeout
    #[error("WebSocket handshake timed out")]
    HandshakeTimeout,

    /// The session dispatcher has stopped and no longer accepts events
    #[error("Session dispatcher is not running")]
    DispatcherClosed,

    /// A peer stopped reading and an outbound write did not complete in time
    #[error("WebSocket write timed out")]
    WriteTimeout,

    /// `serve` was called twice on the same server
    #[error("Server is already running")]
    AlreadyRunning,
}

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::WriteTimeout.to_string(), "WebSocket write timed out");
        assert_eq!(Error::HandshakeTimeout.to_string(), "WebSocket handshake timed out");
        assert_eq!(Error::DispatcherClosed.to_string(), "Session dispatcher is not running");
    }

    #[test]
    fn test_io_error_converts() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
