//! Per-connection WebSocket task
//!
//! Performs the handshake, registers with the session dispatcher, then pumps
//! inbound frames, outbound updates and the idle timer until the connection
//! ends. Exactly one `Disconnect` is sent for every registered connection.
//!
//! A frame read or a completed write counts as activity for the idle timer,
//! so a viewer that only listens stays connected while updates flow. Every
//! write is bounded by `write_timeout`; a peer that stops reading is dropped
//! instead of parking the task on TCP backpressure.

use std::net::SocketAddr;

use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::{accept_async, WebSocketStream};

use crate::error::{Error, Result};
use crate::protocol::InboundMessage;
use crate::server::config::ServerConfig;
use crate::session::{ConnectionHandle, ConnectionId, SessionHandle};
use crate::telemetry::TelemetrySample;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Why the frame loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Peer,
    Idle,
    SessionClosed,
}

/// A single client connection
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    config: ServerConfig,
    sessions: SessionHandle,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        config: ServerConfig,
        sessions: SessionHandle,
    ) -> Self {
        Self {
            id,
            peer_addr,
            config,
            sessions,
        }
    }

    /// Run the connection to completion
    pub async fn run(self, socket: TcpStream) -> Result<()> {
        let ws = tokio::time::timeout(self.config.connection_timeout, accept_async(socket))
            .await
            .map_err(|_| Error::HandshakeTimeout)??;

        let (handle, outbound) =
            ConnectionHandle::channel(self.id, self.config.outbound_queue_capacity);
        self.sessions.connect(handle)?;

        tracing::debug!(
            connection_id = %self.id,
            peer = %self.peer_addr,
            "WebSocket handshake complete"
        );

        let result = self.pump(ws, outbound).await;

        // The dispatcher may already be gone during shutdown
        let _ = self.sessions.disconnect(self.id);

        match &result {
            Ok(reason) => tracing::debug!(
                connection_id = %self.id,
                reason = ?reason,
                "Connection ended"
            ),
            Err(e) => tracing::debug!(
                connection_id = %self.id,
                error = %e,
                "Connection ended with error"
            ),
        }

        result.map(|_| ())
    }

    async fn pump(
        &self,
        ws: WebSocketStream<TcpStream>,
        mut outbound: mpsc::Receiver<Bytes>,
    ) -> Result<CloseReason> {
        let (mut sink, mut stream) = ws.split();

        let idle = self.config.idle_timeout;
        let idle_timer = tokio::time::sleep(idle);
        tokio::pin!(idle_timer);

        loop {
            tokio::select! {
                inbound = stream.next() => {
                    let message = match inbound {
                        Some(message) => message?,
                        None => return Ok(CloseReason::Peer),
                    };

                    if !idle.is_zero() {
                        idle_timer.as_mut().reset(Instant::now() + idle);
                    }

                    if !self.on_message(message)? {
                        return Ok(CloseReason::Peer);
                    }
                }

                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        let _ = self.write(&mut sink, Message::Close(None)).await;
                        return Ok(CloseReason::SessionClosed);
                    };

                    match Utf8Bytes::try_from(frame) {
                        Ok(text) => {
                            self.write(&mut sink, Message::Text(text)).await?;
                            if !idle.is_zero() {
                                idle_timer.as_mut().reset(Instant::now() + idle);
                            }
                        }
                        Err(e) => tracing::error!(
                            connection_id = %self.id,
                            error = %e,
                            "Outbound frame is not UTF-8"
                        ),
                    }
                }

                _ = &mut idle_timer, if !idle.is_zero() => {
                    tracing::info!(
                        connection_id = %self.id,
                        peer = %self.peer_addr,
                        idle_secs = idle.as_secs(),
                        "Idle timeout, closing connection"
                    );
                    let _ = self.write(&mut sink, Message::Close(None)).await;
                    return Ok(CloseReason::Idle);
                }
            }
        }
    }

    async fn write(&self, sink: &mut WsSink, message: Message) -> Result<()> {
        match tokio::time::timeout(self.config.write_timeout, sink.send(message)).await {
            Ok(sent) => Ok(sent?),
            Err(_) => {
                tracing::warn!(
                    connection_id = %self.id,
                    peer = %self.peer_addr,
                    timeout_ms = self.config.write_timeout.as_millis() as u64,
                    "Write timed out, peer is not reading"
                );
                Err(Error::WriteTimeout)
            }
        }
    }

    /// Handle one inbound frame. Returns false when the peer closed.
    fn on_message(&self, message: Message) -> Result<bool> {
        match message {
            Message::Text(text) => self.on_text(text.as_str())?,
            Message::Binary(_) => {
                tracing::trace!(connection_id = %self.id, "Binary frame ignored");
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            Message::Close(_) => return Ok(false),
        }
        Ok(true)
    }

    fn on_text(&self, text: &str) -> Result<()> {
        let message = match InboundMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(connection_id = %self.id, error = %e, "Undecodable frame ignored");
                return Ok(());
            }
        };

        match message {
            InboundMessage::Subscribe { vin: Some(vin) } => self.sessions.subscribe(self.id, vin),
            InboundMessage::Subscribe { vin: None } => {
                tracing::debug!(connection_id = %self.id, "Subscribe without vehicle identifier ignored");
                Ok(())
            }
            InboundMessage::Unsubscribe => self.sessions.unsubscribe(self.id),
            InboundMessage::Telemetry(payload) => self
                .sessions
                .telemetry(self.id, TelemetrySample::received_now(payload)),
        }
    }
}
