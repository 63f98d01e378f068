//! Concrete storage backends.

use tracing::warn;

use super::{GuildSettings, StoreError, StoreResult};

mod file;
mod mongo;
mod sqlite;

#[cfg(test)]
pub(crate) mod memory;

pub use file::{FileBackend, DEFAULT_FILE_PATH};
pub use mongo::{MongoBackend, DEFAULT_MONGO_ARGS};
pub use sqlite::{SqliteBackend, DEFAULT_DB_PATH};

/// Settle the read that follows a create-if-absent write.
///
/// A record that exists but cannot be decoded is overwritten with defaults
/// through `replace`, so one bad record never makes its guild unusable.
pub(crate) fn settle_created(
    tenant_id: u64,
    location: &str,
    fetched: StoreResult<Option<GuildSettings>>,
    replace: impl FnOnce(&GuildSettings) -> StoreResult<()>,
) -> StoreResult<GuildSettings> {
    match fetched {
        Ok(Some(settings)) => Ok(settings),
        Ok(None) => Err(StoreError::malformed(tenant_id, "record missing right after create")),
        Err(e @ StoreError::Malformed { .. }) => {
            warn!("Replacing unreadable record in {}: {}", location, e);
            let settings = GuildSettings::new(tenant_id);
            replace(&settings)?;
            Ok(settings)
        }
        Err(e) => Err(e),
    }
}
