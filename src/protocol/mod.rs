//! Wire protocol
//!
//! JSON envelopes carried in WebSocket text frames.

pub mod constants;
pub mod message;

pub use message::{encode_telemetry_update, InboundMessage, ProtocolError};
