//! Persisted settings file and the active store selector.
//!
//! The file is shared with the chat layer, which keeps its own keys in it
//! (credentials and the like). Only `version` and `guildConfigStore` are
//! interpreted here; everything else is carried through untouched.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::BackendKind;
use crate::utils::write_json_atomic;

/// Settings file format version written by this build.
pub const SETTINGS_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "settings file {} has version {found}, newest supported is {supported}",
        .path.display(),
        supported = SETTINGS_VERSION
    )]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("cannot write settings file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which backend the process should open, and with what arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSelector {
    pub kind: BackendKind,

    /// Free-form constructor argument; blank means the backend default.
    #[serde(default)]
    pub args: String,

    /// When a migration last pointed the selector here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_at: Option<DateTime<Utc>>,
}

impl StoreSelector {
    pub fn new(kind: BackendKind, args: impl Into<String>) -> Self {
        Self {
            kind,
            args: args.into(),
            migrated_at: None,
        }
    }

    /// Arguments with the backend default filled in.
    pub fn effective_args(&self) -> &str {
        self.kind.resolve_args(&self.args)
    }
}

impl Default for StoreSelector {
    fn default() -> Self {
        Self::new(BackendKind::Json, "")
    }
}

fn current_version() -> u32 {
    SETTINGS_VERSION
}

/// Contents of the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "current_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_config_store: Option<StoreSelector>,

    /// Keys owned by other parts of the bot.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            guild_config_store: None,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Read the settings file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if settings.version > SETTINGS_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: settings.version,
            });
        }
        Ok(settings)
    }

    /// Write the settings file atomically, stamping the current version.
    pub fn save(&mut self, path: &Path) -> Result<(), SettingsError> {
        self.version = SETTINGS_VERSION;
        write_json_atomic(path, self).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The configured store, or the JSON file store if none is set.
    pub fn store_selector(&self) -> StoreSelector {
        match &self.guild_config_store {
            Some(selector) => selector.clone(),
            None => {
                warn!("No guildConfigStore settings found. Defaulting to {}", BackendKind::Json);
                StoreSelector::default()
            }
        }
    }

    /// Point the selector at a migration target, stamped with the current time.
    pub fn activate(&mut self, mut selector: StoreSelector) {
        selector.migrated_at = Some(Utc::now());
        self.guild_config_store = Some(selector);
    }
}
