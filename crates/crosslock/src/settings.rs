//! Strategy selection and the configuration record.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crosslock_core::error::LockError;

/// Which storage backend coordinates the lock.
///
/// The set is closed: configuration naming anything else fails at parse time
/// with [`LockError::UnsupportedStrategy`] instead of silently landing on a
/// default backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Advisory file locks in a shared directory.
    File,
    /// Lease rows in a PostgreSQL table.
    Relational,
    /// A Redis key with TTL, polled by waiters.
    KeyValue,
    /// The Redis key protocol plus release notifications for waiters.
    PubSub,
}

impl Strategy {
    /// Every supported strategy.
    pub const ALL: [Strategy; 4] = [
        Strategy::File,
        Strategy::Relational,
        Strategy::KeyValue,
        Strategy::PubSub,
    ];

    /// The configuration name of this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::File => "file",
            Strategy::Relational => "relational",
            Strategy::KeyValue => "keyvalue",
            Strategy::PubSub => "pubsub",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Strategy::File),
            "relational" => Ok(Strategy::Relational),
            "keyvalue" => Ok(Strategy::KeyValue),
            "pubsub" => Ok(Strategy::PubSub),
            other => Err(LockError::UnsupportedStrategy(other.to_string())),
        }
    }
}

/// Everything a mutex needs, in one explicit record.
///
/// Only `strategy` and `lock_name` are universal; the remaining fields feed
/// the strategy they are named for and are ignored by the others. Missing
/// strategy-specific settings surface as [`LockError::InvalidConfig`] when
/// the backend is built, not at some first use later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Which backend coordinates the lock.
    pub strategy: Strategy,
    /// Name every cooperating process must share, verbatim.
    pub lock_name: String,
    /// Lease lifetime handed to TTL-capable backends.
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl: Duration,
    /// Re-attempt cadence while waiting for a held lock.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Lock file directory (`file` strategy).
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Lease table name (`relational` strategy); defaults to
    /// [`crate::factory::DEFAULT_TABLE`].
    #[serde(default)]
    pub table: Option<String>,
    /// Store connection URL (`relational`, `keyvalue` and `pubsub`
    /// strategies).
    #[serde(default)]
    pub connection: Option<String>,
    /// Key namespace (`keyvalue` and `pubsub` strategies); defaults to
    /// `crosslock:`.
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl Settings {
    /// Lease lifetime used when the configuration leaves `lease_ttl` unset.
    pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(30);
    /// Cadence used when the configuration leaves `poll_interval` unset.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// A settings record with default timing and no strategy-specific
    /// fields filled in.
    pub fn new(strategy: Strategy, lock_name: impl Into<String>) -> Self {
        Self {
            strategy,
            lock_name: lock_name.into(),
            lease_ttl: Self::DEFAULT_LEASE_TTL,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            directory: None,
            table: None,
            connection: None,
            key_prefix: None,
        }
    }
}

fn default_lease_ttl() -> Duration {
    Settings::DEFAULT_LEASE_TTL
}

fn default_poll_interval() -> Duration {
    Settings::DEFAULT_POLL_INTERVAL
}
