//! Telemetry samples

pub mod sample;

pub use sample::TelemetrySample;
