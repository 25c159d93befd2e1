//! The backend trait every storage engine implements.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::LockResult;
use crate::lease::{LockName, OwnerToken};

/// How long an acquisition may block and how often it re-attempts.
///
/// The poll interval is a cadence, not a promise: backends with cheap
/// attempts back off exponentially from it, backends with wake-up
/// notifications use it as a fallback floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    timeout: Duration,
    poll_interval: Duration,
}

impl Wait {
    /// Minimum poll cadence; shorter configured intervals are clamped so a
    /// zero interval cannot spin.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

    /// Creates a wait budget. A zero `timeout` means a single attempt.
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(Self::MIN_POLL_INTERVAL),
        }
    }

    /// Total time the acquisition may block.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cadence for re-attempts, already clamped to a sane minimum.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Whether only a single attempt should be made.
    pub fn is_single_attempt(&self) -> bool {
        self.timeout.is_zero()
    }
}

/// A storage engine that can hold named, mutually exclusive leases.
///
/// Implementations own their connection handle (file handle, pool, client)
/// and drop it with the backend value. All methods take the lock name and
/// owner token explicitly; backends keep no per-lock state beyond what the
/// store itself holds, except the file backend which must retain the locked
/// file handle.
///
/// The `bool` results encode expected contention outcomes:
///
/// - `acquire` → `Ok(false)`: not acquired within the wait budget.
/// - `release`/`renew` → `Ok(false)`: the store no longer recognizes the
///   token as owner (the lease expired and may have been taken over).
///
/// Errors are reserved for infrastructure problems and misuse.
#[async_trait]
pub trait LockBackend: Send + Sync + std::fmt::Debug {
    /// Attempts to take the lock for `token`, retrying within `wait`.
    ///
    /// `ttl` is the lease lifetime for expiry-capable stores; backends
    /// without expiry ignore it.
    async fn acquire(
        &mut self,
        name: &LockName,
        token: &OwnerToken,
        ttl: Duration,
        wait: Wait,
    ) -> LockResult<bool>;

    /// Releases the lock if `token` still owns it.
    async fn release(&mut self, name: &LockName, token: &OwnerToken) -> LockResult<bool>;

    /// Whether anyone currently holds the lock. Advisory: the answer can be
    /// stale by the time the caller acts on it.
    async fn is_locked(&self, name: &LockName) -> LockResult<bool>;

    /// Pushes the lease deadline to `extension` from now if `token` still
    /// owns the lock. Backends without expiry report whether the lock is
    /// held and otherwise do nothing.
    async fn renew(
        &mut self,
        name: &LockName,
        token: &OwnerToken,
        extension: Duration,
    ) -> LockResult<bool>;

    /// Whether leases on this backend expire on their own. `false` means
    /// crash recovery relies on the operating system instead of a TTL.
    fn supports_expiry(&self) -> bool;
}
