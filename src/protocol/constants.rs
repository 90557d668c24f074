//! Wire protocol constants

/// Default listening port (matches the REST service's historical `PORT` default)
pub const DEFAULT_PORT: u16 = 3000;

/// Inbound: watch a vehicle identifier
pub const EVENT_SUBSCRIBE: &str = "subscribe";
/// Legacy name for [`EVENT_SUBSCRIBE`] still sent by older dashboards
pub const EVENT_SUBSCRIBE_LEGACY: &str = "subscribeToVin";

/// Inbound: stop watching the current vehicle identifier
pub const EVENT_UNSUBSCRIBE: &str = "unsubscribe";
/// Legacy name for [`EVENT_UNSUBSCRIBE`]
pub const EVENT_UNSUBSCRIBE_LEGACY: &str = "unsubscribeFromVin";

/// Inbound: a telemetry sample from a reporting device
pub const EVENT_TELEMETRY: &str = "telemetry";
/// Name used by the device firmware for [`EVENT_TELEMETRY`]
pub const EVENT_TELEMETRY_LEGACY: &str = "obdData";

/// Outbound: a sample fanned out to subscribers
pub const EVENT_TELEMETRY_UPDATE: &str = "telemetryUpdate";

/// Sample field carrying the vehicle identifier
pub const FIELD_VIN: &str = "vin";
/// Accepted alias for [`FIELD_VIN`]
pub const FIELD_VIN_ALIAS: &str = "vehicleId";

/// Sample field carrying vehicle speed
pub const FIELD_SPEED: &str = "vehicleSpeed";
/// Accepted alias for [`FIELD_SPEED`]
pub const FIELD_SPEED_ALIAS: &str = "speed";

/// Sample field carrying fuel level
pub const FIELD_FUEL: &str = "fuelLevel";
/// Accepted alias for [`FIELD_FUEL`]
pub const FIELD_FUEL_ALIAS: &str = "fuel";

/// Default per-connection outbound queue depth
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;
