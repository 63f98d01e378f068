//! Backend kinds and the table that constructs them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::CacheConfig;

use super::{
    CachedConfigStore, ConfigStore, FileBackend, MongoBackend, SqliteBackend, StoreError,
    StoreResult, DEFAULT_DB_PATH, DEFAULT_FILE_PATH, DEFAULT_MONGO_ARGS,
};

/// Which durable backend a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Single JSON document.
    #[serde(alias = "file")]
    Json,
    /// One SQLite row per guild.
    #[serde(alias = "relational")]
    Sqlite,
    /// One MongoDB document per guild.
    #[serde(alias = "mongodb")]
    Mongo,
}

type Factory = fn(&str, CacheConfig) -> StoreResult<Arc<dyn ConfigStore>>;

struct BackendEntry {
    kind: BackendKind,
    names: &'static [&'static str],
    default_args: &'static str,
    open: Factory,
}

fn open_json(args: &str, cache: CacheConfig) -> StoreResult<Arc<dyn ConfigStore>> {
    Ok(Arc::new(CachedConfigStore::new(FileBackend::open(args)?, cache)))
}

fn open_sqlite(args: &str, cache: CacheConfig) -> StoreResult<Arc<dyn ConfigStore>> {
    Ok(Arc::new(CachedConfigStore::new(SqliteBackend::open(args)?, cache)))
}

fn open_mongo(args: &str, cache: CacheConfig) -> StoreResult<Arc<dyn ConfigStore>> {
    Ok(Arc::new(CachedConfigStore::new(MongoBackend::connect(args)?, cache)))
}

static BACKENDS: [BackendEntry; 3] = [
    BackendEntry {
        kind: BackendKind::Json,
        names: &["json", "file", "herald::store::FileConfigStore"],
        default_args: DEFAULT_FILE_PATH,
        open: open_json,
    },
    BackendEntry {
        kind: BackendKind::Sqlite,
        names: &["sqlite", "relational", "herald::store::RelationalConfigStore"],
        default_args: DEFAULT_DB_PATH,
        open: open_sqlite,
    },
    BackendEntry {
        kind: BackendKind::Mongo,
        names: &["mongo", "mongodb", "herald::store::MongoConfigStore"],
        default_args: DEFAULT_MONGO_ARGS,
        open: open_mongo,
    },
];

impl BackendKind {
    fn entry(self) -> &'static BackendEntry {
        // Every kind has exactly one row in the table.
        match self {
            Self::Json => &BACKENDS[0],
            Self::Sqlite => &BACKENDS[1],
            Self::Mongo => &BACKENDS[2],
        }
    }

    /// Canonical identifier, as written to the settings file.
    pub fn identifier(self) -> &'static str {
        self.entry().names[0]
    }

    /// Arguments used when none are configured.
    pub fn default_args(self) -> &'static str {
        self.entry().default_args
    }

    /// `args`, or the default when blank.
    pub fn resolve_args(self, args: &str) -> &str {
        let args = args.trim();
        if args.is_empty() {
            self.default_args()
        } else {
            args
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        BACKENDS
            .iter()
            .find(|entry| entry.names.iter().any(|name| name.eq_ignore_ascii_case(wanted)))
            .map(|entry| entry.kind)
            .ok_or_else(|| StoreError::UnknownBackend(wanted.to_string()))
    }
}

/// Construct the store for `kind`. Blank `args` select the backend default.
pub fn open_store(
    kind: BackendKind,
    args: &str,
    cache: CacheConfig,
) -> StoreResult<Arc<dyn ConfigStore>> {
    let args = kind.resolve_args(args);
    info!("Opening {} guild config store ({})", kind, args);
    (kind.entry().open)(args, cache)
}
