//! Cache configuration.

/// Configuration for a cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    /// A capacity of zero disables caching entirely.
    pub max_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::guild_configs()
    }
}

impl CacheConfig {
    /// Create a new cache config with the given max capacity.
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self { max_capacity }
    }

    /// Set max capacity for cache (builder pattern).
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// A config that turns every lookup into a pass-through.
    pub fn disabled() -> Self {
        Self { max_capacity: 0 }
    }

    /// Config for per-guild settings looked up on every command.
    /// Small, since only a handful of guilds are active at once.
    pub fn guild_configs() -> Self {
        Self { max_capacity: 10 }
    }

    /// Config for the "edit the command, edit the reply" index.
    /// Only very recent invocations are realistically edited.
    pub fn response_edits() -> Self {
        Self { max_capacity: 5 }
    }

    /// Whether this config caches anything at all.
    pub fn is_enabled(&self) -> bool {
        self.max_capacity > 0
    }
}
