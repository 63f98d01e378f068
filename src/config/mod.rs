//! Configuration module for Herald.
//!
//! Process-level knobs come from environment variables; the active store
//! backend comes from the settings file (see [`Settings`]).

mod settings;

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::cache::CacheConfig;

pub use settings::{Settings, SettingsError, StoreSelector, SETTINGS_VERSION};

/// Default location of the settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "config.json";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings file holding the active store selector.
    pub settings_path: PathBuf,

    /// Guild config cache. Zero disables caching.
    pub guild_cache: CacheConfig,

    /// Command-to-reply cache used for edit tracking.
    pub response_cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            guild_cache: CacheConfig::guild_configs(),
            response_cache: CacheConfig::response_edits(),
        }
    }
}

/// Read a capacity variable, falling back to `default` when unset or invalid.
fn capacity_from_env(key: &str, default: CacheConfig) -> CacheConfig {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(capacity) => default.max_capacity(capacity),
            Err(_) => {
                warn!("Ignoring invalid {}={:?}, using {}", key, raw, default.max_capacity);
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let settings_path = env::var("HERALD_SETTINGS_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.settings_path);

        Self {
            settings_path,
            guild_cache: capacity_from_env("GUILD_CONFIG_CACHE_SIZE", defaults.guild_cache),
            response_cache: capacity_from_env("RESPONSE_CACHE_SIZE", defaults.response_cache),
        }
    }
}
