//! Lock identity and lease bookkeeping.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::error::{LockError, LockResult};

/// Name of a lock, shared verbatim by every process that contends for it.
///
/// The name is opaque to the backends: each derives its storage key (file
/// name, row key, Redis key) from it deterministically, so equal names always
/// map to the same underlying resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockName(String);

impl LockName {
    /// Validates and wraps a lock name. Names must contain at least one
    /// non-whitespace character.
    pub fn new(name: impl Into<String>) -> LockResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LockError::InvalidName(
                "lock name cannot be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LockName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for LockName {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Token identifying one acquisition of a lock.
///
/// A fresh token is generated for every successful acquisition, so release
/// and renew can prove ownership against the store even after the lease
/// expired and the lock changed hands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerToken(String);

/// Process-local acquisition counter, part of the token uniqueness story.
static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

impl OwnerToken {
    /// Generates a token that is unique across processes and acquisitions:
    /// process id, a process-local counter and 64 random bits.
    pub fn generate() -> Self {
        let count = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        let random: u64 = rand::thread_rng().r#gen();
        Self(format!("{pid}-{count}-{random:016x}"))
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OwnerToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Record of one held acquisition: which lock, under which token, and until
/// when the store considers it valid.
///
/// `expires_at` is `None` for backends without TTL semantics (the file
/// backend), where the operating system reclaims the lock at process exit.
#[derive(Debug, Clone)]
pub struct Lease {
    name: LockName,
    token: OwnerToken,
    acquired_at: SystemTime,
    expires_at: Option<SystemTime>,
}

impl Lease {
    /// Creates a lease starting now, expiring after `ttl` if one is given.
    pub fn new(name: LockName, token: OwnerToken, ttl: Option<Duration>) -> Self {
        let acquired_at = SystemTime::now();
        Self {
            name,
            token,
            acquired_at,
            expires_at: ttl.map(|ttl| acquired_at + ttl),
        }
    }

    /// The lock this lease belongs to.
    pub fn name(&self) -> &LockName {
        &self.name
    }

    /// The token proving ownership of this acquisition.
    pub fn token(&self) -> &OwnerToken {
        &self.token
    }

    /// When the lease was acquired.
    pub fn acquired_at(&self) -> SystemTime {
        self.acquired_at
    }

    /// TTL deadline, if the backend expires leases.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// Time left until expiry. `None` when the lease never expires,
    /// `Some(ZERO)` when the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at.map(|deadline| {
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO)
        })
    }

    /// Whether the TTL deadline has passed. Always `false` without a TTL.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(deadline) => SystemTime::now() >= deadline,
            None => false,
        }
    }

    /// Moves the deadline to `extension` from now, after a successful renew.
    pub fn extend(&mut self, extension: Duration) {
        self.expires_at = Some(SystemTime::now() + extension);
    }
}

/// Milliseconds since the unix epoch, the timestamp unit stored by
/// TTL-capable backends. A clock before 1970 degrades to zero, which reads
/// as "expired" everywhere.
pub fn unix_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
