//! Strategy-driven backend construction.

use tracing::debug;

use crosslock_core::backend::LockBackend;
use crosslock_core::error::{LockError, LockResult};
use crosslock_file::FileBackend;
use crosslock_redis::{KeyValueBackend, PubSubBackend};
use crosslock_relational::RelationalBackend;

use crate::settings::{Settings, Strategy};

/// Lease table used when the configuration leaves `table` unset.
pub const DEFAULT_TABLE: &str = "crosslock_locks";

/// Builds the backend `settings.strategy` selects.
///
/// Each arm validates the settings that strategy needs and fails with
/// [`LockError::InvalidConfig`] when one is missing; a strategy never falls
/// back to another. Unknown strategy *names* never reach this function: they
/// already fail when parsed into [`Strategy`]. The relational arm also
/// creates the lease table if it does not exist, so a fresh database works
/// out of the box.
pub async fn build_backend(settings: &Settings) -> LockResult<Box<dyn LockBackend>> {
    debug!(strategy = %settings.strategy, lock.name = %settings.lock_name, "building lock backend");
    match settings.strategy {
        Strategy::File => {
            let directory = settings
                .directory
                .as_ref()
                .ok_or_else(|| missing("directory", Strategy::File))?;
            Ok(Box::new(FileBackend::new(directory)?))
        }
        Strategy::Relational => {
            let url = connection(settings, Strategy::Relational)?;
            let table = settings.table.as_deref().unwrap_or(DEFAULT_TABLE);
            let backend = RelationalBackend::connect(url, table).await?;
            backend.ensure_table().await?;
            Ok(Box::new(backend))
        }
        Strategy::KeyValue => {
            let url = connection(settings, Strategy::KeyValue)?;
            Ok(Box::new(
                KeyValueBackend::connect(url, key_prefix(settings)).await?,
            ))
        }
        Strategy::PubSub => {
            let url = connection(settings, Strategy::PubSub)?;
            Ok(Box::new(
                PubSubBackend::connect(url, key_prefix(settings)).await?,
            ))
        }
    }
}

fn connection<'a>(settings: &'a Settings, strategy: Strategy) -> LockResult<&'a str> {
    settings
        .connection
        .as_deref()
        .ok_or_else(|| missing("connection", strategy))
}

fn key_prefix(settings: &Settings) -> String {
    settings
        .key_prefix
        .clone()
        .unwrap_or_else(|| KeyValueBackend::DEFAULT_PREFIX.to_string())
}

fn missing(field: &str, strategy: Strategy) -> LockError {
    LockError::InvalidConfig(format!(
        "the {strategy} strategy requires the `{field}` setting"
    ))
}
