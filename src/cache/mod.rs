//! Cache module - bounded in-memory caches.
//!
//! Caches here are a pure performance layer. They never hold the only copy
//! of anything: a miss must always be answered by the authoritative store.
//!
//! ## Usage
//!
//! ```rust
//! use herald::cache::{BoundedCache, CacheConfig};
//!
//! let cache: BoundedCache<u64, String> = BoundedCache::new("names", CacheConfig::with_capacity(2));
//! cache.put(1, "one".to_string());
//! assert_eq!(cache.get(&1).as_deref(), Some("one"));
//! ```

mod bounded;
mod config;
mod response;

pub use bounded::BoundedCache;
pub use config::CacheConfig;
pub use response::ResponseEditCache;
