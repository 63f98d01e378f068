//! Single JSON document backend.
//!
//! The whole document is loaded at startup and mirrored in memory. Every
//! write replaces one guild's entry in the mirror and rewrites the file
//! atomically under a single writer lock.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::store::{BackendKind, ConfigBackend, GuildSettings, StoreError, StoreResult};
use crate::utils::write_json_atomic;

/// Default location of the guild settings document.
pub const DEFAULT_FILE_PATH: &str = "guild_settings.json";

/// On-disk shape of one guild entry.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileRecord {
    announcer_ids: Vec<u64>,
    announcement_roles: Vec<u64>,
    subscriptions_enabled: bool,
}

impl FileRecord {
    fn from_settings(settings: &GuildSettings) -> Self {
        Self {
            announcer_ids: settings.announcer_role_ids().iter().copied().collect(),
            announcement_roles: settings.announcement_role_ids().iter().copied().collect(),
            subscriptions_enabled: settings.subscriptions_enabled(),
        }
    }

    fn into_settings(self, tenant_id: u64) -> GuildSettings {
        GuildSettings::from_parts(
            tenant_id,
            self.announcer_ids,
            self.announcement_roles,
            self.subscriptions_enabled,
        )
    }
}

/// Parse one top-level entry of the document.
fn decode(key: &str, value: &Value) -> StoreResult<GuildSettings> {
    let tenant_id: u64 = key
        .parse()
        .map_err(|_| StoreError::malformed(key, "key is not a guild id"))?;
    let record = FileRecord::deserialize(value).map_err(|e| StoreError::malformed(key, e))?;
    Ok(record.into_settings(tenant_id))
}

/// Guild settings stored as one JSON object keyed by decimal guild id.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    document: Mutex<Map<String, Value>>,
}

impl FileBackend {
    /// Open (or start) the document at `path`.
    ///
    /// Malformed entries are logged and skipped but left in the document, so
    /// rewriting the file never destroys data it could not read. A file that
    /// is not a JSON object at all is fatal.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let document = if path.exists() {
            let raw =
                std::fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
            match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => map,
                _ => {
                    return Err(StoreError::malformed(
                        path.display(),
                        "guild settings file is not a JSON object",
                    ));
                }
            }
        } else {
            info!("No guild settings file at {}, starting empty", path.display());
            Map::new()
        };

        let mut loaded = 0usize;
        for (key, value) in &document {
            match decode(key, value) {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Skipping entry in {}: {}", path.display(), e),
            }
        }
        info!("Loaded {} guild configs from {}", loaded, path.display());

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `value` under `key` and rewrite the file. Rolls the mirror back
    /// if the write fails.
    fn write_entry(&self, document: &mut Map<String, Value>, key: String, value: Value) -> StoreResult<()> {
        let previous = document.insert(key.clone(), value);
        if let Err(e) = write_json_atomic(&self.path, &*document) {
            match previous {
                Some(previous) => document.insert(key, previous),
                None => document.remove(&key),
            };
            return Err(StoreError::io(&self.path, e));
        }
        Ok(())
    }
}

impl ConfigBackend for FileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Json
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }

    fn fetch(&self, tenant_id: u64) -> StoreResult<Option<GuildSettings>> {
        let key = tenant_id.to_string();
        let document = self.document.lock();
        document
            .get(&key)
            .map(|value| decode(&key, value))
            .transpose()
    }

    fn create(&self, tenant_id: u64) -> StoreResult<GuildSettings> {
        let key = tenant_id.to_string();
        let mut document = self.document.lock();
        if let Some(value) = document.get(&key) {
            match decode(&key, value) {
                Ok(existing) => return Ok(existing),
                Err(e) => warn!("Replacing unreadable entry in {}: {}", self.path.display(), e),
            }
        }

        let settings = GuildSettings::new(tenant_id);
        let value = serde_json::to_value(FileRecord::from_settings(&settings))?;
        self.write_entry(&mut document, key, value)?;
        Ok(settings)
    }

    fn fetch_all(&self) -> StoreResult<Vec<GuildSettings>> {
        let document = self.document.lock();
        Ok(document
            .iter()
            .filter_map(|(key, value)| {
                decode(key, value)
                    .inspect_err(|e| warn!("Skipping entry in {}: {}", self.path.display(), e))
                    .ok()
            })
            .collect())
    }

    fn store(&self, settings: &GuildSettings) -> StoreResult<()> {
        let value = serde_json::to_value(FileRecord::from_settings(settings))?;
        let mut document = self.document.lock();
        self.write_entry(&mut document, settings.tenant_id().to_string(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::store::{ConfigStore, FileConfigStore};
    use serde_json::json;

    fn open_store(path: &Path) -> FileConfigStore {
        FileConfigStore::new(FileBackend::open(path).unwrap(), CacheConfig::guild_configs())
    }

    #[test]
    fn test_update_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guilds.json");

        {
            let store = open_store(&path);
            let config = store.get_or_create(1).unwrap();
            config.add_announcer_role(10);
            config.add_announcement_role(20);
            config.set_subscriptions_enabled(true);
            config.update().unwrap();
        }

        let store = open_store(&path);
        assert_eq!(
            store.get_or_create(1).unwrap().snapshot(),
            GuildSettings::from_parts(1, [10], [20], true)
        );
    }

    #[test]
    fn test_on_disk_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guilds.json");
        let store = open_store(&path);
        let config = store.get_or_create(42).unwrap();
        config.add_announcer_role(7);
        config.update().unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            json!({
                "42": {
                    "announcerIds": [7],
                    "announcementRoles": [],
                    "subscriptionsEnabled": false
                }
            })
        );
    }

    #[test]
    fn test_creation_is_persisted_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guilds.json");
        open_store(&path).get_or_create(5).unwrap();

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.fetch(5).unwrap(), Some(GuildSettings::new(5)));
    }

    #[test]
    fn test_malformed_entries_are_skipped_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guilds.json");
        let original = json!({
            "not-a-guild": {"announcerIds": [], "announcementRoles": [], "subscriptionsEnabled": false},
            "2": {"announcerIds": [1]},
            "3": {"announcerIds": [], "announcementRoles": [30], "subscriptionsEnabled": true}
        });
        std::fs::write(&path, original.to_string()).unwrap();

        let store = open_store(&path);
        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tenant_id(), 3);

        store.get_or_create(4).unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("not-a-guild").is_some());
        assert!(raw.get("4").is_some());
    }

    #[test]
    fn test_non_object_document_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guilds.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(matches!(FileBackend::open(&path), Err(StoreError::Malformed { .. })));
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guilds.json");
        let store = open_store(&path);

        std::thread::scope(|scope| {
            for id in 1..=8u64 {
                let store = &store;
                scope.spawn(move || {
                    let config = store.get_or_create(id).unwrap();
                    config.add_announcer_role(id * 10);
                    config.update().unwrap();
                });
            }
        });

        let reloaded = FileBackend::open(&path).unwrap();
        let all = reloaded.fetch_all().unwrap();
        assert_eq!(all.len(), 8);
        assert!(all.iter().all(|s| s.is_announcer_role(s.tenant_id() * 10)));
    }

    #[test]
    fn test_concurrent_first_access_writes_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guilds.json");
        let store = FileConfigStore::new(FileBackend::open(&path).unwrap(), CacheConfig::disabled());

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| store.get_or_create(9).unwrap());
            }
        });

        assert_eq!(store.get_all().unwrap().len(), 1);
    }
}
