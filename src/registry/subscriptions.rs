//! Subscription registry implementation
//!
//! Maps a vehicle identifier to the set of connections watching it.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::session::ConnectionId;

/// Vehicle → watching connections
///
/// Buckets are created on first subscription and deleted the moment they
/// become empty, so no key ever maps to an empty set.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    buckets: HashMap<String, HashSet<ConnectionId>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a vehicle's bucket
    ///
    /// Returns false if the connection was already a member.
    pub fn add(&mut self, vin: &str, connection: ConnectionId) -> bool {
        let added = self
            .buckets
            .entry(vin.to_owned())
            .or_default()
            .insert(connection);

        if added {
            tracing::debug!(
                vin = %vin,
                connection_id = %connection,
                subscribers = self.subscriber_count(vin),
                "Subscriber added"
            );
        }

        added
    }

    /// Remove a connection from a vehicle's bucket
    ///
    /// Deletes the bucket when it becomes empty. Removing a non-member is a no-op
    /// and returns false.
    pub fn remove(&mut self, vin: &str, connection: ConnectionId) -> bool {
        let Entry::Occupied(mut bucket) = self.buckets.entry(vin.to_owned()) else {
            return false;
        };

        let removed = bucket.get_mut().remove(&connection);
        if bucket.get().is_empty() {
            bucket.remove();
            tracing::debug!(vin = %vin, "Last subscriber left, vehicle entry removed");
        } else if removed {
            tracing::debug!(
                vin = %vin,
                connection_id = %connection,
                subscribers = bucket.get().len(),
                "Subscriber removed"
            );
        }

        removed
    }

    /// Connections currently watching `vin`
    pub fn subscribers(&self, vin: &str) -> impl Iterator<Item = ConnectionId> + '_ {
        self.buckets.get(vin).into_iter().flatten().copied()
    }

    /// Whether `connection` watches `vin`
    pub fn contains(&self, vin: &str, connection: ConnectionId) -> bool {
        self.buckets
            .get(vin)
            .is_some_and(|bucket| bucket.contains(&connection))
    }

    /// Whether `vin` has an entry
    pub fn has_vehicle(&self, vin: &str) -> bool {
        self.buckets.contains_key(vin)
    }

    /// Number of subscribers for `vin`
    pub fn subscriber_count(&self, vin: &str) -> usize {
        self.buckets.get(vin).map_or(0, HashSet::len)
    }

    /// Number of vehicles with at least one subscriber
    pub fn vehicle_count(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    #[test]
    fn test_add_creates_bucket() {
        let mut registry = SubscriptionRegistry::new();
        assert!(!registry.has_vehicle("VIN1"));

        assert!(registry.add("VIN1", id(1)));

        assert!(registry.has_vehicle("VIN1"));
        assert!(registry.contains("VIN1", id(1)));
        assert_eq!(registry.subscriber_count("VIN1"), 1);
        assert_eq!(registry.vehicle_count(), 1);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = SubscriptionRegistry::new();

        assert!(registry.add("VIN1", id(1)));
        assert!(!registry.add("VIN1", id(1)));

        assert_eq!(registry.subscriber_count("VIN1"), 1);
    }

    #[test]
    fn test_remove_deletes_empty_bucket() {
        let mut registry = SubscriptionRegistry::new();
        registry.add("VIN1", id(1));
        registry.add("VIN1", id(2));

        assert!(registry.remove("VIN1", id(1)));
        assert!(registry.has_vehicle("VIN1"));

        assert!(registry.remove("VIN1", id(2)));
        assert!(!registry.has_vehicle("VIN1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_non_member_is_noop() {
        let mut registry = SubscriptionRegistry::new();
        registry.add("VIN1", id(1));

        assert!(!registry.remove("VIN1", id(9)));
        assert!(!registry.remove("VIN2", id(1)));

        assert_eq!(registry.subscriber_count("VIN1"), 1);
        assert!(!registry.has_vehicle("VIN2"));
    }

    #[test]
    fn test_subscribers() {
        let mut registry = SubscriptionRegistry::new();
        registry.add("VIN1", id(1));
        registry.add("VIN1", id(2));
        registry.add("VIN2", id(3));

        let mut vin1: Vec<_> = registry.subscribers("VIN1").collect();
        vin1.sort();
        assert_eq!(vin1, vec![id(1), id(2)]);

        assert_eq!(registry.subscribers("VIN3").count(), 0);
    }
}
