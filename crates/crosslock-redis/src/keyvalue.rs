//! Redis key-value backend.

use std::fmt;
use std::time::Duration;

use fred::prelude::*;
use tracing::{Span, instrument};

use crosslock_core::backend::{LockBackend, Wait};
use crosslock_core::error::LockResult;
use crosslock_core::lease::{LockName, OwnerToken};
use crosslock_core::retry::Deadline;

use crate::ops;

/// Backend that holds the lease in a single Redis key.
///
/// Acquisition is `SET key token PX ttl NX`, release is a server-side
/// compare-and-delete, renewal a compare-and-extend; Redis itself expires
/// abandoned leases at the TTL deadline. Waiters poll at a fixed
/// `poll_interval` cadence; see the pub/sub backend for notification-assisted
/// waiting.
pub struct KeyValueBackend {
    client: RedisClient,
    prefix: String,
}

impl KeyValueBackend {
    /// Key prefix used when the configuration leaves it unset.
    pub const DEFAULT_PREFIX: &'static str = "crosslock:";

    /// Connects to `url` and namespaces every lock key with `prefix`.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> LockResult<Self> {
        let client = ops::connect(url).await?;
        Ok(Self::from_client(client, prefix))
    }

    /// Wraps an already connected client.
    pub fn from_client(client: RedisClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    /// The Redis key a lock name maps to.
    pub fn key(&self, name: &LockName) -> String {
        ops::lock_key(&self.prefix, name.as_str())
    }

    /// Configured key prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn client(&self) -> &RedisClient {
        &self.client
    }

    pub(crate) async fn try_acquire_once(
        &self,
        name: &LockName,
        token: &OwnerToken,
        ttl: Duration,
    ) -> LockResult<bool> {
        ops::set_if_absent(&self.client, &self.key(name), token.as_str(), ttl).await
    }
}

#[async_trait::async_trait]
impl LockBackend for KeyValueBackend {
    #[instrument(
        skip(self, token),
        fields(lock.name = %name, backend = "keyvalue", acquired = tracing::field::Empty, elapsed_ms = tracing::field::Empty)
    )]
    async fn acquire(
        &mut self,
        name: &LockName,
        token: &OwnerToken,
        ttl: Duration,
        wait: Wait,
    ) -> LockResult<bool> {
        let deadline = Deadline::starting_now(wait.timeout());

        loop {
            if self.try_acquire_once(name, token, ttl).await? {
                Span::current().record("acquired", true);
                Span::current().record("elapsed_ms", deadline.elapsed().as_millis() as u64);
                return Ok(true);
            }

            if wait.is_single_attempt() || deadline.expired() {
                Span::current().record("acquired", false);
                return Ok(false);
            }

            tokio::time::sleep(deadline.clamp(wait.poll_interval())).await;
        }
    }

    #[instrument(skip(self, token), fields(lock.name = %name, backend = "keyvalue"))]
    async fn release(&mut self, name: &LockName, token: &OwnerToken) -> LockResult<bool> {
        ops::delete_if_owner(&self.client, &self.key(name), token.as_str()).await
    }

    /// Key existence. Advisory only: the key can expire or appear between
    /// this answer and whatever the caller does with it.
    #[instrument(skip(self), fields(lock.name = %name, backend = "keyvalue"))]
    async fn is_locked(&self, name: &LockName) -> LockResult<bool> {
        ops::key_exists(&self.client, &self.key(name)).await
    }

    #[instrument(skip(self, token), fields(lock.name = %name, backend = "keyvalue"))]
    async fn renew(
        &mut self,
        name: &LockName,
        token: &OwnerToken,
        extension: Duration,
    ) -> LockResult<bool> {
        ops::extend_if_owner(&self.client, &self.key(name), token.as_str(), extension).await
    }

    fn supports_expiry(&self) -> bool {
        true
    }
}

impl fmt::Debug for KeyValueBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The client config can embed credentials; show the prefix only.
        f.debug_struct("KeyValueBackend")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
