//! Named, mutually exclusive locks for processes that share nothing but a
//! storage backend.
//!
//! A [`Mutex`] wraps one of several interchangeable [`LockBackend`]s,
//! selected by [`Strategy`] through an explicit [`Settings`] record:
//!
//! | strategy     | store                 | waiters          | abandoned leases        |
//! |--------------|-----------------------|------------------|-------------------------|
//! | `file`       | lock files, `flock`   | backoff polling  | OS releases on exit     |
//! | `relational` | PostgreSQL lease rows | backoff polling  | TTL takeover            |
//! | `keyvalue`   | Redis key, `SET NX PX`| fixed polling    | key expires             |
//! | `pubsub`     | Redis key + channel   | notified + poll  | key expires             |
//!
//! Every successful acquisition creates a lease under a fresh owner token;
//! release and renew prove ownership with that token, so a holder whose
//! lease expired cannot disturb the next holder. Failing to acquire within
//! the blocking timeout is an expected outcome and comes back as
//! `Ok(false)`, never as an error.
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Duration;
//! use crosslock::{Mutex, Settings, Strategy};
//!
//! # async fn run() -> crosslock::LockResult<()> {
//! let mut settings = Settings::new(Strategy::KeyValue, "nightly-report");
//! settings.connection = Some("redis://localhost:6379".to_string());
//! settings.lease_ttl = Duration::from_secs(30);
//!
//! let mut mutex = Mutex::from_settings(&settings).await?;
//! if mutex.acquire(Duration::ZERO).await? {
//!     // we are the only runner of the nightly report
//!     mutex.release().await?;
//! } else {
//!     // another process beat us to it
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Backends can also be built directly (an existing `PgPool`, a shared
//! Redis client, a plain directory) and handed to [`Mutex::new`]; the
//! per-backend crates document their constructors.

pub mod factory;
pub mod mutex;
pub mod settings;

pub use crosslock_core::backend::{LockBackend, Wait};
pub use crosslock_core::error::{LockError, LockResult};
pub use crosslock_core::lease::{Lease, LockName, OwnerToken};
pub use crosslock_file::FileBackend;
pub use crosslock_redis::{KeyValueBackend, PubSubBackend};
pub use crosslock_relational::RelationalBackend;

pub use factory::{DEFAULT_TABLE, build_backend};
pub use mutex::Mutex;
pub use settings::{Settings, Strategy};
