//! Error types for lock operations.

use thiserror::Error;

/// Errors that can occur during lock operations.
///
/// Two outcomes callers might expect here are deliberately *not* errors:
/// failing to acquire within the blocking timeout, and releasing a lease the
/// store has already handed to someone else. Both are expected contention
/// signals and surface as `Ok(false)` from the corresponding operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The backing store could not be reached (connection refused, pool
    /// exhausted, TLS failure and friends).
    #[error("backend unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// This mutex already holds a live lease; acquire again only after release.
    #[error("lock '{0}' is already held by this mutex")]
    AlreadyHeld(String),

    /// Release or renew was called while no lease is held locally.
    #[error("lock '{0}' is not held by this mutex")]
    NotOwned(String),

    /// The configured strategy name is not one of the supported backends.
    #[error("unsupported lock strategy '{0}'")]
    UnsupportedStrategy(String),

    /// Invalid lock name.
    #[error("invalid lock name: {0}")]
    InvalidName(String),

    /// The settings record is missing or carries an unusable value for the
    /// selected strategy.
    #[error("invalid lock configuration: {0}")]
    InvalidConfig(String),

    /// Backend-specific error.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
