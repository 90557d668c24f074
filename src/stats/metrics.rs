//! Statistics for the telemetry relay

use std::time::Duration;

use crate::store::PersistStats;

/// Server-wide statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever registered
    pub total_connections: u64,
    /// Current live connections
    pub active_connections: u64,
    /// Vehicles with at least one subscriber
    pub active_vehicles: u64,
    /// Routable samples ingested
    pub samples_received: u64,
    /// Samples dropped for lacking a vehicle identifier
    pub samples_dropped: u64,
    /// Updates queued to subscribers
    pub updates_delivered: u64,
    /// Updates dropped because a subscriber's queue was full
    pub updates_dropped: u64,
    /// Journeys handed to the persister
    pub journeys_submitted: u64,
    /// Journeys discarded at close (no samples)
    pub journeys_discarded: u64,
    /// Journeys finalized early at the sample cap
    pub checkpoints: u64,
    /// Journeys saved
    pub journeys_saved: u64,
    /// Journeys dropped because the vehicle is not registered
    pub journeys_unknown_vehicle: u64,
    /// Journeys lost to lookup or save failures
    pub journeys_failed: u64,
    /// Uptime
    pub uptime: Duration,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the persistence counters into this snapshot
    pub fn with_persistence(mut self, persist: &PersistStats) -> Self {
        self.journeys_saved = persist.saved();
        self.journeys_unknown_vehicle = persist.unknown_vehicle();
        self.journeys_failed = persist.failed();
        self
    }

    /// Journeys submitted whose persistence task has not finished
    pub fn journeys_pending(&self) -> u64 {
        self.journeys_submitted.saturating_sub(
            self.journeys_saved + self.journeys_unknown_vehicle + self.journeys_failed,
        )
    }

    /// Fraction of fan-out updates that reached a queue
    pub fn delivery_ratio(&self) -> f64 {
        let attempted = self.updates_delivered + self.updates_dropped;
        if attempted > 0 {
            self.updates_delivered as f64 / attempted as f64
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_stats_new() {
        let stats = ServerStats::new();
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.samples_received, 0);
        assert_eq!(stats.journeys_submitted, 0);
        assert_eq!(stats.journeys_pending(), 0);
    }

    #[test]
    fn test_journeys_pending() {
        let stats = ServerStats {
            journeys_submitted: 5,
            journeys_saved: 2,
            journeys_unknown_vehicle: 1,
            journeys_failed: 1,
            ..Default::default()
        };

        assert_eq!(stats.journeys_pending(), 1);
    }

    #[test]
    fn test_delivery_ratio() {
        let mut stats = ServerStats::new();
        assert_eq!(stats.delivery_ratio(), 1.0);

        stats.updates_delivered = 3;
        stats.updates_dropped = 1;
        assert_eq!(stats.delivery_ratio(), 0.75);
    }

    #[test]
    fn test_with_persistence_empty() {
        let stats = ServerStats::new().with_persistence(&PersistStats::default());

        assert_eq!(stats.journeys_saved, 0);
        assert_eq!(stats.journeys_unknown_vehicle, 0);
        assert_eq!(stats.journeys_failed, 0);
    }
}
