//! Redis backends for the crosslock distributed mutex.
//!
//! Two flavors over the same single-key lease protocol (`SET NX PX`,
//! Lua compare-and-delete / compare-and-extend):
//!
//! - [`KeyValueBackend`]: waiters poll at a fixed cadence.
//! - [`PubSubBackend`]: release publishes on a per-lock channel so waiters
//!   wake early; polling remains the correctness backstop.
//!
//! Both self-heal abandoned leases through the key TTL.

pub mod keyvalue;
mod ops;
pub mod pubsub;

pub use keyvalue::KeyValueBackend;
pub use pubsub::PubSubBackend;
