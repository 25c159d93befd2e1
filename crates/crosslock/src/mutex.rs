//! The mutex façade over a pluggable backend.

use std::fmt;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crosslock_core::backend::{LockBackend, Wait};
use crosslock_core::error::{LockError, LockResult};
use crosslock_core::lease::{Lease, LockName, OwnerToken};

use crate::factory::build_backend;
use crate::settings::Settings;

/// A named lock that at most one holder owns at a time, coordinated through
/// a storage backend.
///
/// One `Mutex` value tracks at most one live [`Lease`]. Every successful
/// [`acquire`](Self::acquire) mints a fresh [`OwnerToken`], so a holder
/// whose lease expired can never release or renew what the next holder took
/// over; the store's answer to such a stale request is `Ok(false)`, reported
/// with a warning rather than an error.
pub struct Mutex {
    name: LockName,
    backend: Box<dyn LockBackend>,
    lease_ttl: Duration,
    poll_interval: Duration,
    lease: Option<Lease>,
}

impl Mutex {
    /// Builds the backend described by `settings` and wraps it.
    pub async fn from_settings(settings: &Settings) -> LockResult<Self> {
        let name = LockName::new(settings.lock_name.clone())?;
        let backend = build_backend(settings).await?;
        Ok(Self {
            name,
            backend,
            lease_ttl: settings.lease_ttl,
            poll_interval: settings.poll_interval,
            lease: None,
        })
    }

    /// Wraps an explicit backend with default timing. Useful for tests and
    /// for backends constructed outside the [`Settings`] surface (an
    /// existing pool, a shared client).
    pub fn new(name: LockName, backend: Box<dyn LockBackend>) -> Self {
        Self {
            name,
            backend,
            lease_ttl: Settings::DEFAULT_LEASE_TTL,
            poll_interval: Settings::DEFAULT_POLL_INTERVAL,
            lease: None,
        }
    }

    /// Sets the lease lifetime handed to TTL-capable backends.
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Sets the re-attempt cadence used while waiting.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The lock's name.
    pub fn name(&self) -> &LockName {
        &self.name
    }

    /// Whether this mutex currently tracks a live lease. Local state only;
    /// see [`is_locked`](Self::is_locked) for the store's view.
    pub fn is_acquired(&self) -> bool {
        self.lease.is_some()
    }

    /// The current lease, while one is held.
    pub fn lease(&self) -> Option<&Lease> {
        self.lease.as_ref()
    }

    /// Attempts to take the lock, waiting up to `blocking_timeout`.
    ///
    /// A zero timeout makes exactly one attempt. `Ok(false)` means the lock
    /// stayed held by someone else for the whole wait; that is an expected
    /// outcome, not an error. Acquiring while this mutex already holds a
    /// lease is misuse and fails with [`LockError::AlreadyHeld`].
    #[instrument(skip(self), fields(lock.name = %self.name))]
    pub async fn acquire(&mut self, blocking_timeout: Duration) -> LockResult<bool> {
        if self.lease.is_some() {
            return Err(LockError::AlreadyHeld(self.name.to_string()));
        }
        if self.backend.supports_expiry() && self.lease_ttl.is_zero() {
            return Err(LockError::InvalidConfig(
                "lease_ttl must be positive for a TTL-based backend".to_string(),
            ));
        }

        let token = OwnerToken::generate();
        let wait = Wait::new(blocking_timeout, self.poll_interval);
        let acquired = self
            .backend
            .acquire(&self.name, &token, self.lease_ttl, wait)
            .await?;
        if acquired {
            let ttl = self.backend.supports_expiry().then_some(self.lease_ttl);
            self.lease = Some(Lease::new(self.name.clone(), token, ttl));
            debug!(lock.name = %self.name, "lock acquired");
        }
        Ok(acquired)
    }

    /// Releases the held lease.
    ///
    /// `Ok(false)` means the store no longer recognized our token: the lease
    /// expired and someone else may already hold the lock. Either way this
    /// mutex is back in the unlocked state afterwards. Calling without a
    /// lease is misuse and fails with [`LockError::NotOwned`]; backend
    /// errors keep the lease so the release can be retried.
    #[instrument(skip(self), fields(lock.name = %self.name))]
    pub async fn release(&mut self) -> LockResult<bool> {
        let Some(lease) = self.lease.take() else {
            return Err(LockError::NotOwned(self.name.to_string()));
        };

        let released = match self.backend.release(&self.name, lease.token()).await {
            Ok(released) => released,
            Err(e) => {
                self.lease = Some(lease);
                return Err(e);
            }
        };

        if released {
            debug!(lock.name = %self.name, "lock released");
        } else {
            warn!(
                lock.name = %self.name,
                "release found the lease already gone (expired and possibly taken over)"
            );
        }
        Ok(released)
    }

    /// Whether anyone holds the lock right now, according to the store.
    ///
    /// Advisory: the answer can be stale as soon as it arrives. Use
    /// [`acquire`](Self::acquire) to actually take the lock.
    #[instrument(skip(self), fields(lock.name = %self.name))]
    pub async fn is_locked(&self) -> LockResult<bool> {
        self.backend.is_locked(&self.name).await
    }

    /// Extends the held lease's deadline to `extension` from now.
    ///
    /// `Ok(false)` means ownership was already lost (TTL ran out); the local
    /// lease is cleared. On backends without expiry this only confirms the
    /// lock is still held. Calling without a lease fails with
    /// [`LockError::NotOwned`].
    #[instrument(skip(self), fields(lock.name = %self.name))]
    pub async fn renew(&mut self, extension: Duration) -> LockResult<bool> {
        let Some(lease) = &self.lease else {
            return Err(LockError::NotOwned(self.name.to_string()));
        };
        let token = lease.token().clone();

        let renewed = self.backend.renew(&self.name, &token, extension).await?;
        if renewed {
            if self.backend.supports_expiry()
                && let Some(lease) = &mut self.lease
            {
                lease.extend(extension);
            }
            debug!(lock.name = %self.name, extension = ?extension, "lease renewed");
        } else {
            self.lease = None;
            warn!(
                lock.name = %self.name,
                "renewal found the lease already gone (expired and possibly taken over)"
            );
        }
        Ok(renewed)
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("name", &self.name)
            .field("lease_ttl", &self.lease_ttl)
            .field("poll_interval", &self.poll_interval)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        if let Some(lease) = &self.lease {
            // No async in Drop; the lease is left to the backend's TTL or,
            // for file locks, to the OS closing the handle.
            warn!(
                lock.name = %self.name,
                token = %lease.token(),
                "mutex dropped while holding its lease; expiry or process exit will reclaim it"
            );
        }
    }
}
