//! Journey accumulation and finalized records

pub mod buffer;
pub mod record;

pub use buffer::JourneyBuffer;
pub use record::{
    CompletedJourney, DiscardReason, FuelPoint, JourneyTimestamp, PersistedJourney, SpeedPoint,
};
