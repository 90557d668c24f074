//! Vehicle subscription registry
//!
//! Tracks which connections watch which vehicle. Owned and mutated only by the
//! [`SessionManager`](crate::session::SessionManager); fan-out reads a bucket
//! and delivers the encoded frame to each member's outbound queue.
//!
//! # Architecture
//!
//! ```text
//!                  SubscriptionRegistry
//!            ┌──────────────────────────────┐
//!            │ "VIN1" → {conn 3, conn 7}    │
//!            │ "VIN2" → {conn 4}            │
//!            └──────────────┬───────────────┘
//!                           │ subscribers("VIN1")
//!         ┌─────────────────┴─────────────────┐
//!         ▼                                   ▼
//!   conn 3 outbound queue             conn 7 outbound queue
//! ```
//!
//! # Zero-Copy Fan-out
//!
//! A sample is encoded once into `bytes::Bytes`; each subscriber's queue gets a
//! reference-counted clone of the same allocation.

pub mod subscriptions;

pub use subscriptions::SubscriptionRegistry;
