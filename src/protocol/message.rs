//! Message envelopes exchanged over the WebSocket
//!
//! Every frame is a JSON text frame of the form `{"event": <name>, "data": <payload>}`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::constants::*;

/// Error decoding an inbound frame
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame is not a JSON envelope
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Envelope names an event this server does not handle
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    event: &'a str,
    data: &'a Value,
}

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Watch a vehicle. `None` when the payload carried no usable identifier.
    Subscribe { vin: Option<String> },
    /// Stop watching the current vehicle
    Unsubscribe,
    /// Raw telemetry sample payload
    Telemetry(Value),
}

impl InboundMessage {
    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;

        match envelope.event.as_str() {
            EVENT_SUBSCRIBE | EVENT_SUBSCRIBE_LEGACY => Ok(InboundMessage::Subscribe {
                vin: subscribe_target(&envelope.data),
            }),
            EVENT_UNSUBSCRIBE | EVENT_UNSUBSCRIBE_LEGACY => Ok(InboundMessage::Unsubscribe),
            EVENT_TELEMETRY | EVENT_TELEMETRY_LEGACY => Ok(InboundMessage::Telemetry(envelope.data)),
            _ => Err(ProtocolError::UnknownEvent(envelope.event)),
        }
    }
}

/// Dashboards send either a bare VIN string or `{"vin": "..."}`
fn subscribe_target(data: &Value) -> Option<String> {
    let vin = match data {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map
            .get(FIELD_VIN)
            .or_else(|| map.get(FIELD_VIN_ALIAS))
            .and_then(Value::as_str),
        _ => None,
    };

    vin.filter(|v| !v.is_empty()).map(str::to_owned)
}

/// Encode a `telemetryUpdate` frame carrying `sample` unchanged
///
/// Encoded once per fan-out; the returned `Bytes` is shared by every subscriber.
pub fn encode_telemetry_update(sample: &Value) -> Result<Bytes, serde_json::Error> {
    let envelope = OutboundEnvelope {
        event: EVENT_TELEMETRY_UPDATE,
        data: sample,
    };
    serde_json::to_vec(&envelope).map(Bytes::from)
}
