//! Offline migration between store backends.
//!
//! Copies every guild config from the active store into a destination store
//! and then repoints the settings file at the destination. Nothing here is
//! transactional: an interrupted run leaves the destination with a prefix
//! of fully copied guilds and the selector untouched, and re-running is safe
//! because each copy is an overwrite.
//!
//! Run it with the bot stopped; concurrent writes to the source are not
//! isolated from the copy.

use std::path::Path;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{Settings, SettingsError, StoreSelector};
use crate::store::{ConfigStore, GuildConfig, StoreError, StoreResult};

/// The copy could not start.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("cannot read configs from source store {store}: {source}")]
    Snapshot {
        store: String,
        #[source]
        source: StoreError,
    },
}

/// A guild that could not be copied.
#[derive(Debug)]
pub struct RecordFailure {
    pub tenant_id: u64,
    pub error: StoreError,
}

/// What happened to the settings file after the copy.
#[derive(Debug)]
pub enum SelectorOutcome {
    /// The settings file now names the destination store.
    Rewritten,
    /// Some guilds failed to copy, so the destination was not activated.
    Skipped,
    /// Every guild was copied but the settings file could not be written.
    /// The next start will still use the old store.
    Failed(SettingsError),
}

/// Result of a full migration run.
#[derive(Debug)]
pub struct MigrationReport {
    pub copied: usize,
    pub failures: Vec<RecordFailure>,
    pub selector: SelectorOutcome,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && matches!(self.selector, SelectorOutcome::Rewritten)
    }
}

/// Copies guild configs from one store to another.
pub struct Migrator<'a> {
    source: &'a dyn ConfigStore,
    destination: &'a dyn ConfigStore,
}

impl<'a> Migrator<'a> {
    pub fn new(source: &'a dyn ConfigStore, destination: &'a dyn ConfigStore) -> Self {
        Self {
            source,
            destination,
        }
    }

    fn copy_one(&self, record: &GuildConfig) -> StoreResult<()> {
        let target = self.destination.get_or_create(record.tenant_id())?;
        target.copy_from(&record.snapshot());
        self.destination.update(&target)
    }

    /// Copy every guild. Returns the number copied and the per-guild failures.
    pub fn copy_all(&self) -> Result<(usize, Vec<RecordFailure>), MigrationError> {
        let records = self.source.get_all().map_err(|source| MigrationError::Snapshot {
            store: self.source.describe(),
            source,
        })?;
        info!(
            "Migrating {} guild configs from {} to {}",
            records.len(),
            self.source.describe(),
            self.destination.describe()
        );

        let mut copied = 0;
        let mut failures = Vec::new();
        for record in &records {
            match self.copy_one(record) {
                Ok(()) => copied += 1,
                Err(error) => {
                    warn!("Failed to migrate guild {}: {}", record.tenant_id(), error);
                    failures.push(RecordFailure {
                        tenant_id: record.tenant_id(),
                        error,
                    });
                }
            }
        }

        info!("Migrated {} of {} guild configs", copied, records.len());
        Ok((copied, failures))
    }

    /// Copy every guild, then point `settings_path` at `target` if nothing
    /// failed.
    pub fn run(
        &self,
        settings_path: &Path,
        target: StoreSelector,
    ) -> Result<MigrationReport, MigrationError> {
        let (copied, failures) = self.copy_all()?;

        let selector = if !failures.is_empty() {
            error!(
                "{} guild configs failed to migrate; {} stays active. Fix the errors and re-run",
                failures.len(),
                self.source.describe()
            );
            SelectorOutcome::Skipped
        } else {
            match activate(settings_path, target) {
                Ok(()) => {
                    info!("Done. Please verify {} and restart the bot", settings_path.display());
                    SelectorOutcome::Rewritten
                }
                Err(e) => {
                    error!(
                        "All guild configs were migrated, but updating {} failed: {}. \
                         Set the store there yourself before restarting the bot",
                        settings_path.display(),
                        e
                    );
                    SelectorOutcome::Failed(e)
                }
            }
        };

        Ok(MigrationReport {
            copied,
            failures,
            selector,
        })
    }
}

fn activate(settings_path: &Path, target: StoreSelector) -> Result<(), SettingsError> {
    let mut settings = Settings::load(settings_path)?;
    settings.activate(target);
    settings.save(settings_path)
}
