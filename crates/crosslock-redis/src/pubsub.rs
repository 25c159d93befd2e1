//! Redis key-value backend with release notifications.

use std::fmt;
use std::time::Duration;

use fred::prelude::*;
use tokio::sync::broadcast::error::RecvError;
use tracing::{Span, instrument, warn};

use crosslock_core::backend::{LockBackend, Wait};
use crosslock_core::error::LockResult;
use crosslock_core::lease::{LockName, OwnerToken};
use crosslock_core::retry::Deadline;

use crate::keyvalue::KeyValueBackend;
use crate::ops;

/// Key-value backend plus a wake-up channel per lock.
///
/// The lease protocol is exactly [`KeyValueBackend`]'s. On top of it, a
/// blocking acquire subscribes to a name-derived channel on a dedicated
/// subscriber connection, and a successful release publishes there, so
/// waiters usually retry within a round-trip of the release instead of a
/// full poll interval.
///
/// Notifications are hints, nothing more. Pub/sub delivery is fire-and-forget
/// (a waiter that subscribes a moment too late, or a dropped message, gets no
/// replay), so waiters cap every wait at `poll_interval` and missed messages
/// cost latency, never correctness.
pub struct PubSubBackend {
    inner: KeyValueBackend,
    subscriber: RedisClient,
}

impl PubSubBackend {
    /// Connects to `url` with one command connection and one subscriber
    /// connection.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> LockResult<Self> {
        let client = ops::connect(url).await?;
        Self::from_client(client, prefix).await
    }

    /// Wraps an already connected client; the subscriber connection is
    /// spawned off the same config.
    pub async fn from_client(client: RedisClient, prefix: impl Into<String>) -> LockResult<Self> {
        let subscriber = client.clone_new();
        let _ = subscriber.connect();
        subscriber.wait_for_connect().await.map_err(ops::classify)?;
        Ok(Self {
            inner: KeyValueBackend::from_client(client, prefix),
            subscriber,
        })
    }

    /// The channel release notifications for `name` go out on.
    pub fn channel(&self, name: &LockName) -> String {
        ops::released_channel(self.inner.prefix(), name.as_str())
    }

    /// The Redis key a lock name maps to.
    pub fn key(&self, name: &LockName) -> String {
        self.inner.key(name)
    }

    /// Sleeps until a release notification for `channel` arrives or `wait`
    /// elapses, whichever comes first.
    async fn wait_for_release_hint(&self, channel: &str, wait: Duration) {
        let mut rx = self.subscriber.message_rx();
        let hint = async {
            loop {
                match rx.recv().await {
                    Ok(message) if &*message.channel == channel => break,
                    // Another lock's channel on the shared subscriber.
                    Ok(_) => {}
                    // Overflowed the buffer; whatever we missed might have
                    // been ours, re-attempt now.
                    Err(RecvError::Lagged(_)) => break,
                    // No live subscription stream; fall back to the poll
                    // cadence by waiting out the timeout.
                    Err(RecvError::Closed) => std::future::pending::<()>().await,
                }
            }
        };
        let _ = tokio::time::timeout(wait, hint).await;
    }

    async fn acquire_subscribed(
        &self,
        name: &LockName,
        token: &OwnerToken,
        ttl: Duration,
        wait: Wait,
        deadline: Deadline,
        channel: &str,
    ) -> LockResult<bool> {
        loop {
            self.wait_for_release_hint(channel, deadline.clamp(wait.poll_interval()))
                .await;
            if self.inner.try_acquire_once(name, token, ttl).await? {
                return Ok(true);
            }
            if deadline.expired() {
                return Ok(false);
            }
        }
    }
}

#[async_trait::async_trait]
impl LockBackend for PubSubBackend {
    #[instrument(
        skip(self, token),
        fields(lock.name = %name, backend = "pubsub", acquired = tracing::field::Empty, elapsed_ms = tracing::field::Empty)
    )]
    async fn acquire(
        &mut self,
        name: &LockName,
        token: &OwnerToken,
        ttl: Duration,
        wait: Wait,
    ) -> LockResult<bool> {
        let deadline = Deadline::starting_now(wait.timeout());

        if self.inner.try_acquire_once(name, token, ttl).await? {
            Span::current().record("acquired", true);
            Span::current().record("elapsed_ms", deadline.elapsed().as_millis() as u64);
            return Ok(true);
        }
        if wait.is_single_attempt() || deadline.expired() {
            Span::current().record("acquired", false);
            return Ok(false);
        }

        // Subscribe before waiting so a release between our failed attempt
        // and the first wait is not missed entirely.
        let channel = self.channel(name);
        self.subscriber
            .subscribe(channel.as_str())
            .await
            .map_err(ops::classify)?;
        let acquired = self
            .acquire_subscribed(name, token, ttl, wait, deadline, &channel)
            .await;
        let _ = self.subscriber.unsubscribe(channel.as_str()).await;

        if let Ok(acquired) = &acquired {
            Span::current().record("acquired", *acquired);
            Span::current().record("elapsed_ms", deadline.elapsed().as_millis() as u64);
        }
        acquired
    }

    #[instrument(skip(self, token), fields(lock.name = %name, backend = "pubsub"))]
    async fn release(&mut self, name: &LockName, token: &OwnerToken) -> LockResult<bool> {
        let released =
            ops::delete_if_owner(self.inner.client(), &self.key(name), token.as_str()).await?;
        if released {
            // Wake waiters. Failing to publish only delays them until their
            // next poll, so it must not fail the release itself.
            let channel = self.channel(name);
            let published: Result<i64, _> =
                self.inner.client().publish(channel, token.as_str()).await;
            if let Err(e) = published {
                warn!(lock.name = %name, error = %e, "release notification failed");
            }
        }
        Ok(released)
    }

    #[instrument(skip(self), fields(lock.name = %name, backend = "pubsub"))]
    async fn is_locked(&self, name: &LockName) -> LockResult<bool> {
        ops::key_exists(self.inner.client(), &self.key(name)).await
    }

    #[instrument(skip(self, token), fields(lock.name = %name, backend = "pubsub"))]
    async fn renew(
        &mut self,
        name: &LockName,
        token: &OwnerToken,
        extension: Duration,
    ) -> LockResult<bool> {
        ops::extend_if_owner(
            self.inner.client(),
            &self.key(name),
            token.as_str(),
            extension,
        )
        .await
    }

    fn supports_expiry(&self) -> bool {
        true
    }
}

impl fmt::Debug for PubSubBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSubBackend")
            .field("prefix", &self.inner.prefix())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channels_are_name_derived() {
        let client = RedisClient::new(RedisConfig::default(), None, None, None);
        let inner = KeyValueBackend::from_client(client.clone_new(), "crosslock:");
        let backend = PubSubBackend {
            inner,
            subscriber: client,
        };
        let name = LockName::new("nightly-report").unwrap();
        assert_eq!(backend.channel(&name), "crosslock:released:nightly-report");
        assert_eq!(backend.key(&name), "crosslock:nightly-report");
    }
}
