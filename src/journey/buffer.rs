//! Per-connection journey accumulator

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::record::{CompletedJourney, DiscardReason, FuelPoint, JourneyTimestamp, SpeedPoint};
use crate::telemetry::TelemetrySample;

/// In-progress journey for one connection
///
/// The vehicle identifier and start time are each set once, by the first
/// routable sample, and never overwritten.
#[derive(Debug, Default)]
pub struct JourneyBuffer {
    vin: Option<String>,
    started_at: Option<JourneyTimestamp>,
    speed_series: Vec<SpeedPoint>,
    fuel_series: Vec<FuelPoint>,
    latest: Option<Value>,
    last_sample_at: Option<DateTime<Utc>>,
}

impl JourneyBuffer {
    /// Create an empty, unbound buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer already bound to a vehicle
    pub fn bound_to(vin: impl Into<String>) -> Self {
        Self {
            vin: Some(vin.into()),
            ..Default::default()
        }
    }

    /// Record a sample
    ///
    /// Returns false (and records nothing) for an unroutable sample.
    pub fn record(&mut self, sample: &TelemetrySample) -> bool {
        let Some(vin) = sample.vin() else {
            return false;
        };

        if self.vin.is_none() {
            self.vin = Some(vin.to_owned());
        }
        if self.started_at.is_none() {
            self.started_at = Some(JourneyTimestamp::from_utc(sample.received_at));
        }

        self.speed_series.push(SpeedPoint {
            time: sample.received_at,
            speed: sample.vehicle_speed,
        });
        self.fuel_series.push(FuelPoint {
            time: sample.received_at,
            fuel_level: sample.fuel_level,
        });
        self.latest = Some(sample.payload.clone());
        self.last_sample_at = Some(sample.received_at);

        true
    }

    /// Bound vehicle identifier
    pub fn vin(&self) -> Option<&str> {
        self.vin.as_deref()
    }

    /// Journey start, if a sample has been recorded
    pub fn started_at(&self) -> Option<JourneyTimestamp> {
        self.started_at
    }

    /// Number of samples recorded
    pub fn len(&self) -> usize {
        self.speed_series.len()
    }

    /// Whether no sample has been recorded
    pub fn is_empty(&self) -> bool {
        self.speed_series.is_empty()
    }

    pub fn speed_series(&self) -> &[SpeedPoint] {
        &self.speed_series
    }

    pub fn fuel_series(&self) -> &[FuelPoint] {
        &self.fuel_series
    }

    /// Most recent raw sample
    pub fn latest_sample(&self) -> Option<&Value> {
        self.latest.as_ref()
    }

    /// Close the journey at `ended_at`
    ///
    /// The end time is clamped so it never precedes the start time.
    pub fn finalize(self, ended_at: DateTime<Utc>) -> Result<CompletedJourney, DiscardReason> {
        let vin = self.vin.ok_or(DiscardReason::NoVehicle)?;
        let started_at = self.started_at.ok_or(DiscardReason::NoSamples)?;
        let ended_at = JourneyTimestamp::from_utc(ended_at).max(started_at);

        Ok(CompletedJourney {
            vin,
            started_at,
            ended_at,
            dataset: self.latest.unwrap_or(Value::Null),
            speed_series: self.speed_series,
            fuel_series: self.fuel_series,
        })
    }

    /// Finalize the collected samples early and keep collecting for the same vehicle
    ///
    /// The checkpointed journey ends at the last sample's arrival. Returns None
    /// when there is nothing to checkpoint.
    pub fn checkpoint(&mut self) -> Option<CompletedJourney> {
        let ended_at = self.last_sample_at?;
        let vin = self.vin.clone()?;
        let full = std::mem::replace(self, JourneyBuffer::bound_to(vin));
        full.finalize(ended_at).ok()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn sample_at(vin: &str, speed: f64, fuel: f64, secs: i64) -> TelemetrySample {
        let at = Utc.with_ymd_and_hms(2025, 3, 30, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs);
        TelemetrySample::from_payload(
            json!({"vin": vin, "vehicleSpeed": speed, "fuelLevel": fuel}),
            at,
        )
    }

    #[test]
    fn test_first_sample_binds_vin_and_start() {
        let mut buffer = JourneyBuffer::new();
        assert!(buffer.vin().is_none());
        assert!(buffer.started_at().is_none());

        assert!(buffer.record(&sample_at("VIN1", 42.0, 70.0, 0)));

        assert_eq!(buffer.vin(), Some("VIN1"));
        assert_eq!(
            buffer.started_at().unwrap().to_string(),
            "2025-03-30 12:00:00"
        );
    }

    #[test]
    fn test_vin_and_start_never_overwritten() {
        let mut buffer = JourneyBuffer::new();
        buffer.record(&sample_at("VIN1", 1.0, 1.0, 0));
        buffer.record(&sample_at("VIN2", 2.0, 2.0, 5));

        assert_eq!(buffer.vin(), Some("VIN1"));
        assert_eq!(
            buffer.started_at().unwrap().to_string(),
            "2025-03-30 12:00:00"
        );
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.latest_sample().unwrap()["vin"], "VIN2");
    }

    #[test]
    fn test_series_keep_order() {
        let mut buffer = JourneyBuffer::new();
        for (i, (speed, fuel)) in [(10.0, 90.0), (20.0, 88.0), (30.0, 85.0)].iter().enumerate() {
            buffer.record(&sample_at("VIN2", *speed, *fuel, i as i64));
        }

        let speeds: Vec<_> = buffer.speed_series().iter().map(|p| p.speed).collect();
        let fuel: Vec<_> = buffer.fuel_series().iter().map(|p| p.fuel_level).collect();
        assert_eq!(speeds, vec![Some(10.0), Some(20.0), Some(30.0)]);
        assert_eq!(fuel, vec![Some(90.0), Some(88.0), Some(85.0)]);
    }

    #[test]
    fn test_unroutable_sample_ignored() {
        let mut buffer = JourneyBuffer::new();
        let sample = TelemetrySample::received_now(json!({"vehicleSpeed": 50}));

        assert!(!buffer.record(&sample));
        assert!(buffer.is_empty());
        assert!(buffer.vin().is_none());
        assert!(buffer.started_at().is_none());
    }

    #[test]
    fn test_finalize_empty_buffer_discards() {
        let buffer = JourneyBuffer::new();
        assert_eq!(
            buffer.finalize(Utc::now()).unwrap_err(),
            DiscardReason::NoVehicle
        );

        let bound = JourneyBuffer::bound_to("VIN1");
        assert_eq!(
            bound.finalize(Utc::now()).unwrap_err(),
            DiscardReason::NoSamples
        );
    }

    #[test]
    fn test_finalize_clamps_end_to_start() {
        let mut buffer = JourneyBuffer::new();
        buffer.record(&sample_at("VIN1", 1.0, 1.0, 60));

        let before_start = Utc.with_ymd_and_hms(2025, 3, 30, 11, 0, 0).unwrap();
        let journey = buffer.finalize(before_start).unwrap();

        assert_eq!(journey.ended_at, journey.started_at);
    }

    #[test]
    fn test_finalize_carries_latest_sample() {
        let mut buffer = JourneyBuffer::new();
        buffer.record(&sample_at("VIN1", 1.0, 1.0, 0));
        buffer.record(&sample_at("VIN1", 2.0, 0.5, 1));

        let journey = buffer.finalize(Utc::now()).unwrap();
        assert_eq!(journey.dataset["vehicleSpeed"], 2.0);
        assert_eq!(journey.sample_count(), 2);
    }

    #[test]
    fn test_checkpoint_keeps_vehicle() {
        let mut buffer = JourneyBuffer::new();
        assert!(buffer.checkpoint().is_none());

        buffer.record(&sample_at("VIN1", 1.0, 1.0, 0));
        buffer.record(&sample_at("VIN1", 2.0, 1.0, 30));

        let journey = buffer.checkpoint().unwrap();
        assert_eq!(journey.sample_count(), 2);
        assert_eq!(journey.ended_at.to_string(), "2025-03-30 12:00:30");

        assert_eq!(buffer.vin(), Some("VIN1"));
        assert!(buffer.is_empty());
        assert!(buffer.started_at().is_none());

        buffer.record(&sample_at("VIN1", 3.0, 1.0, 45));
        assert_eq!(
            buffer.started_at().unwrap().to_string(),
            "2025-03-30 12:00:45"
        );
    }
}
