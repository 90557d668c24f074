//! Telemetry server listener
//!
//! Handles the TCP accept loop and spawns connection tasks.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::session::{ConnectionId, SessionConfig, SessionDispatcher, SessionHandle, SessionManager};
use crate::store::JourneyBackend;

/// WebSocket telemetry server
pub struct TelemetryServer<B> {
    config: ServerConfig,
    sessions: SessionHandle,
    dispatcher: Mutex<Option<SessionDispatcher<B>>>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<B: JourneyBackend> TelemetryServer<B> {
    /// Create a new server persisting journeys to `backend`
    pub fn new(config: ServerConfig, session_config: SessionConfig, backend: Arc<B>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let manager = SessionManager::new(session_config, backend);
        let (dispatcher, sessions) = SessionDispatcher::new(manager);

        Self {
            config,
            sessions,
            dispatcher: Mutex::new(Some(dispatcher)),
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Handle to the session dispatcher
    pub fn sessions(&self) -> &SessionHandle {
        &self.sessions
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// On shutdown every session is closed and pending journeys are flushed
    /// before this returns. A server can only be served once.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let dispatcher = match self.dispatcher.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        }
        .ok_or(Error::AlreadyRunning)?;
        let dispatcher_task = tokio::spawn(dispatcher.run());

        tracing::info!(addr = %listener.local_addr()?, "Telemetry server listening");

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        drop(listener);
        if self.sessions.shutdown().await.is_err() {
            tracing::debug!("Session dispatcher already stopped");
        }
        if let Err(e) = dispatcher_task.await {
            tracing::error!(error = %e, "Session dispatcher task failed");
        }

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let id = ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(connection_id = %id, peer = %peer_addr, "New connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let connection = Connection::new(id, peer_addr, self.config.clone(), self.sessions.clone());

        tokio::spawn(async move {
            // Held for the lifetime of the connection
            let _permit = permit;

            if let Err(e) = connection.run(socket).await {
                tracing::debug!(connection_id = %id, error = %e, "Connection error");
            }

            tracing::debug!(connection_id = %id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
