//! Offline-first static asset cache with versioned invalidation.
//!
//! A `CacheController` owns one named store of captured HTTP responses.
//! It pre-populates the store from a fixed asset list, deletes superseded
//! stores on activation, and answers same-origin GET requests from the
//! store with the network as fallback. Invalidation is all-or-nothing:
//! bumping the configured cache name makes the previous store unreachable
//! and eligible for deletion at the next activation.

pub mod config;
pub mod controller;
pub mod net;
pub mod request;
pub mod store;
