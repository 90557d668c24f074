//! Normalized telemetry sample

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::protocol::constants::*;

/// A single vehicle reading as received from a reporting device
///
/// The routing and series fields are extracted up front; the full payload is
/// kept as-is so that fan-out and the stored dataset see exactly what the
/// device sent, including sensor fields this crate does not interpret.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    /// Vehicle identifier (None = unroutable)
    pub vin: Option<String>,

    /// Vehicle speed, if present and numeric
    pub vehicle_speed: Option<f64>,

    /// Fuel level, if present and numeric
    pub fuel_level: Option<f64>,

    /// Original payload
    pub payload: Value,

    /// Arrival time at this server
    pub received_at: DateTime<Utc>,
}

impl TelemetrySample {
    /// Build a sample from a decoded payload and its arrival time
    pub fn from_payload(payload: Value, received_at: DateTime<Utc>) -> Self {
        let (vin, vehicle_speed, fuel_level) = match payload.as_object() {
            Some(map) => {
                let vin = map
                    .get(FIELD_VIN)
                    .or_else(|| map.get(FIELD_VIN_ALIAS))
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
                    .map(str::to_owned);
                let speed = map
                    .get(FIELD_SPEED)
                    .or_else(|| map.get(FIELD_SPEED_ALIAS))
                    .and_then(Value::as_f64);
                let fuel = map
                    .get(FIELD_FUEL)
                    .or_else(|| map.get(FIELD_FUEL_ALIAS))
                    .and_then(Value::as_f64);
                (vin, speed, fuel)
            }
            None => (None, None, None),
        };

        Self {
            vin,
            vehicle_speed,
            fuel_level,
            payload,
            received_at,
        }
    }

    /// Build a sample stamped with the current time
    pub fn received_now(payload: Value) -> Self {
        Self::from_payload(payload, Utc::now())
    }

    /// Vehicle identifier, if the sample can be routed
    pub fn vin(&self) -> Option<&str> {
        self.vin.as_deref()
    }

    /// Whether the sample carries a vehicle identifier
    pub fn is_routable(&self) -> bool {
        self.vin.is_some()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_extracts_firmware_fields() {
        let payload = json!({
            "vin": "VIN1",
            "vehicleSpeed": 42,
            "fuelLevel": 70.5,
            "engineRpm": 2200,
            "gps": {"lat": 52.1, "lon": 4.3}
        });
        let sample = TelemetrySample::received_now(payload.clone());

        assert_eq!(sample.vin(), Some("VIN1"));
        assert_eq!(sample.vehicle_speed, Some(42.0));
        assert_eq!(sample.fuel_level, Some(70.5));
        assert_eq!(sample.payload, payload);
        assert!(sample.is_routable());
    }

    #[test]
    fn test_accepts_aliases() {
        let sample = TelemetrySample::received_now(json!({
            "vehicleId": "VIN2",
            "speed": 10,
            "fuel": 90
        }));

        assert_eq!(sample.vin(), Some("VIN2"));
        assert_eq!(sample.vehicle_speed, Some(10.0));
        assert_eq!(sample.fuel_level, Some(90.0));
    }

    #[test]
    fn test_missing_or_empty_vin_is_unroutable() {
        let missing = TelemetrySample::received_now(json!({"vehicleSpeed": 3}));
        let empty = TelemetrySample::received_now(json!({"vin": "", "vehicleSpeed": 3}));
        let not_object = TelemetrySample::received_now(json!("VIN1"));

        assert!(!missing.is_routable());
        assert!(!empty.is_routable());
        assert!(!not_object.is_routable());
    }

    #[test]
    fn test_non_numeric_readings_are_none() {
        let sample = TelemetrySample::received_now(json!({
            "vin": "VIN1",
            "vehicleSpeed": "fast",
            "fuelLevel": null
        }));

        assert!(sample.is_routable());
        assert_eq!(sample.vehicle_speed, None);
        assert_eq!(sample.fuel_level, None);
    }
}
