//! Finalized journey records
//!
//! A [`CompletedJourney`] is what a buffer turns into when its connection
//! closes. The persister resolves its VIN and turns it into a
//! [`PersistedJourney`], the shape handed to the journey store.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::store::InternalVehicleId;

/// Journey boundary timestamp: UTC, whole seconds, rendered `YYYY-MM-DD HH:MM:SS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JourneyTimestamp(NaiveDateTime);

impl JourneyTimestamp {
    /// Canonical display format
    pub const FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    /// Truncate a UTC instant to whole seconds
    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(0).naive_utc())
    }

    /// Current time
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Parse the canonical format
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(s, Self::FORMAT).map(Self)
    }

    /// Underlying naive UTC value (what the database column stores)
    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl std::fmt::Display for JourneyTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

fn serialize_millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// One speed observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedPoint {
    #[serde(serialize_with = "serialize_millis")]
    pub time: DateTime<Utc>,
    pub speed: Option<f64>,
}

/// One fuel-level observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelPoint {
    #[serde(serialize_with = "serialize_millis")]
    pub time: DateTime<Utc>,
    #[serde(rename = "fuelLevel")]
    pub fuel_level: Option<f64>,
}

/// Why a buffer produced no journey
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// No routable sample ever bound a vehicle identifier
    NoVehicle,
    /// A vehicle was bound but no start time was recorded
    NoSamples,
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscardReason::NoVehicle => write!(f, "no vehicle identifier recorded"),
            DiscardReason::NoSamples => write!(f, "no journey start recorded"),
        }
    }
}

/// A finalized buffer awaiting VIN resolution
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJourney {
    /// Vehicle identifier bound by the first sample
    pub vin: String,
    /// Arrival of the first sample
    pub started_at: JourneyTimestamp,
    /// Disconnect (or checkpoint) time, never before `started_at`
    pub ended_at: JourneyTimestamp,
    /// Most recent raw sample
    pub dataset: Value,
    pub speed_series: Vec<SpeedPoint>,
    pub fuel_series: Vec<FuelPoint>,
}

impl CompletedJourney {
    /// Number of samples recorded
    pub fn sample_count(&self) -> usize {
        self.speed_series.len()
    }

    /// Serialize the datasets and attach the resolved vehicle id
    pub fn into_persisted(
        self,
        vehicle_id: InternalVehicleId,
    ) -> Result<PersistedJourney, serde_json::Error> {
        Ok(PersistedJourney {
            vehicle_id,
            dataset: serde_json::to_string(&self.dataset)?,
            speed_series: serde_json::to_string(&self.speed_series)?,
            fuel_series: serde_json::to_string(&self.fuel_series)?,
            vin: self.vin,
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}

/// Journey row handed to the [`JourneyStore`](crate::store::JourneyStore)
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedJourney {
    /// Directory-resolved vehicle id
    pub vehicle_id: InternalVehicleId,
    /// VIN the journey was recorded under
    pub vin: String,
    pub started_at: JourneyTimestamp,
    pub ended_at: JourneyTimestamp,
    /// JSON of the most recent raw sample
    pub dataset: String,
    /// JSON array of `{"time", "speed"}`
    pub speed_series: String,
    /// JSON array of `{"time", "fuelLevel"}`
    pub fuel_series: String,
}
