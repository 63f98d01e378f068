//! Guild configuration store.
//!
//! ## Architecture
//!
//! - [`ConfigBackend`] - raw durable storage (JSON file, SQLite, MongoDB)
//! - [`CachedConfigStore`] - wraps any backend with a bounded cache and the
//!   create-on-first-use contract
//! - [`ConfigStore`] - what the rest of the bot talks to
//! - [`open_store`] - builds the store named by a [`StoreSelector`](crate::config::StoreSelector)
//!
//! Command handlers call [`ConfigStore::get_or_create`], mutate the returned
//! [`GuildConfig`] and then call [`GuildConfig::update`]. Every update is
//! written through synchronously; nothing is buffered.

pub(crate) mod backends;
mod cached;
mod error;
mod guild_config;
mod registry;
mod settings;

pub use backends::{
    FileBackend, MongoBackend, SqliteBackend, DEFAULT_DB_PATH, DEFAULT_FILE_PATH, DEFAULT_MONGO_ARGS,
};
pub use cached::CachedConfigStore;
pub use error::{StoreError, StoreResult};
pub use guild_config::GuildConfig;
pub use registry::{open_store, BackendKind};
pub use settings::{GuildSettings, SubscriptionError, SubscriptionToggle};

/// Store backed by a single JSON document.
pub type FileConfigStore = CachedConfigStore<FileBackend>;

/// Store backed by one SQL row per guild.
pub type RelationalConfigStore = CachedConfigStore<SqliteBackend>;

/// Store backed by one MongoDB document per guild.
pub type MongoConfigStore = CachedConfigStore<MongoBackend>;

/// Raw durable storage for guild settings.
///
/// Implementations do no caching. All calls block until the I/O finishes.
pub trait ConfigBackend: Send + Sync + 'static {
    fn kind(&self) -> BackendKind;

    /// Human readable location, used in logs.
    fn describe(&self) -> String;

    /// Read one guild's settings, `None` if never created.
    fn fetch(&self, tenant_id: u64) -> StoreResult<Option<GuildSettings>>;

    /// Persist default settings for a guild unless a record already exists,
    /// and return what is stored afterwards.
    fn create(&self, tenant_id: u64) -> StoreResult<GuildSettings>;

    /// Every readable record. Unreadable ones are logged and skipped.
    fn fetch_all(&self) -> StoreResult<Vec<GuildSettings>>;

    /// Write all fields of `settings`, keyed by its guild id.
    fn store(&self, settings: &GuildSettings) -> StoreResult<()>;
}

/// Storage-agnostic access to guild configurations.
pub trait ConfigStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn describe(&self) -> String;

    /// Get a guild's config, creating and persisting defaults on first use.
    ///
    /// Concurrent first lookups of the same id create at most one record.
    fn get_or_create(&self, tenant_id: u64) -> StoreResult<GuildConfig>;

    /// Every persisted config, read straight from the backend.
    ///
    /// Only meant for migration; this is a full scan.
    fn get_all(&self) -> StoreResult<Vec<GuildConfig>>;

    /// Persist `config`'s current field values.
    fn update(&self, config: &GuildConfig) -> StoreResult<()>;
}
