//! Herald - guild configuration store for an announcement bot.
//!
//! ## Architecture
//!
//! - `cache` - Bounded LRU caches (guild configs, command reply edits)
//! - `store` - `ConfigStore` contract and its JSON / SQLite / MongoDB backends
//! - `config` - Environment configuration and the active store selector
//! - `migration` - Offline copy of every guild config between backends
//! - `context` - Startup wiring for the command layer
//! - `utils` - Utility functions

pub mod cache;
pub mod config;
pub mod context;
pub mod migration;
pub mod store;
pub mod utils;

pub use cache::{BoundedCache, CacheConfig, ResponseEditCache};
pub use store::{ConfigStore, GuildConfig, GuildSettings, StoreError};
