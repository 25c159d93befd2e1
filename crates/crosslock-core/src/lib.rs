//! Core trait and types for the crosslock distributed mutex.
//!
//! This crate defines what a lock backend is ([`LockBackend`]), the identity
//! and lease model shared by every backend ([`LockName`], [`OwnerToken`],
//! [`Lease`]) and the error taxonomy ([`LockError`]). Backend crates
//! implement the trait against a concrete store; the `crosslock` meta crate
//! selects one by strategy and wraps it in the `Mutex` façade.

pub mod backend;
pub mod error;
pub mod lease;
pub mod retry;

pub use backend::{LockBackend, Wait};
pub use error::{LockError, LockResult};
pub use lease::{Lease, LockName, OwnerToken, unix_time_millis};
pub use retry::{Backoff, Deadline};
