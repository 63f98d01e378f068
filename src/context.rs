//! Process startup wiring.
//!
//! Everything the command layer needs from this crate is built once here:
//! the active config store (named by the settings file) and the response
//! edit cache. A store that cannot be constructed is fatal; the process must
//! not run on a half-initialized store.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::cache::ResponseEditCache;
use crate::config::{Config, Settings, SettingsError, StoreSelector};
use crate::store::{open_store, ConfigStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("cannot open guild config store: {0}")]
    Store(#[from] StoreError),
}

/// Open the store named by the settings file.
pub fn open_active_store(
    config: &Config,
) -> Result<(StoreSelector, Arc<dyn ConfigStore>), StartupError> {
    let selector = Settings::load(&config.settings_path)?.store_selector();
    let store = open_store(selector.kind, &selector.args, config.guild_cache)?;
    info!("Guild config store: {}", store.describe());
    Ok((selector, store))
}

/// Shared state handed to command handlers.
///
/// `H` is the chat layer's handle to a sent message.
#[derive(Clone)]
pub struct BotContext<H>
where
    H: Clone + Send + Sync + 'static,
{
    pub store: Arc<dyn ConfigStore>,
    pub response_edits: ResponseEditCache<H>,
}

impl<H> BotContext<H>
where
    H: Clone + Send + Sync + 'static,
{
    pub fn init(config: &Config) -> Result<Self, StartupError> {
        let (_, store) = open_active_store(config)?;
        Ok(Self {
            store,
            response_edits: ResponseEditCache::new(config.response_cache),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::store::BackendKind;
    use serde_json::json;

    fn config_in(dir: &std::path::Path) -> Config {
        Config {
            settings_path: dir.join("config.json"),
            guild_cache: CacheConfig::guild_configs(),
            response_cache: CacheConfig::with_capacity(2),
        }
    }

    #[test]
    fn test_init_opens_selected_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let db = dir.path().join("guilds.db");
        std::fs::write(
            &config.settings_path,
            json!({"guildConfigStore": {"kind": "sqlite", "args": db.to_str().unwrap()}}).to_string(),
        )
        .unwrap();

        let ctx: BotContext<u64> = BotContext::init(&config).unwrap();

        assert_eq!(ctx.store.kind(), BackendKind::Sqlite);
        ctx.response_edits.record(1, 100);
        assert_eq!(ctx.response_edits.lookup(1), Some(100));
    }

    #[test]
    fn test_init_fails_on_unconstructible_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let bad = dir.path().join("missing").join("guilds.db");
        std::fs::write(
            &config.settings_path,
            json!({"guildConfigStore": {"kind": "sqlite", "args": bad.to_str().unwrap()}}).to_string(),
        )
        .unwrap();

        assert!(matches!(
            BotContext::<u64>::init(&config),
            Err(StartupError::Store(_))
        ));
    }

    #[test]
    fn test_unknown_backend_kind_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(
            &config.settings_path,
            json!({"guildConfigStore": {"kind": "redis"}}).to_string(),
        )
        .unwrap();

        assert!(matches!(
            open_active_store(&config),
            Err(StartupError::Settings(SettingsError::Parse { .. }))
        ));
    }
}
