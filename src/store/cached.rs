//! Caching decorator shared by every backend.

use std::sync::{Arc, Weak};

use tracing::{debug, error, info, warn};

use crate::cache::{BoundedCache, CacheConfig};

use super::guild_config::PersistSink;
use super::{BackendKind, ConfigBackend, ConfigStore, GuildConfig, GuildSettings, StoreResult};

/// Wraps a raw [`ConfigBackend`] with a bounded cache and the
/// create-on-first-use contract of [`ConfigStore`].
pub struct CachedConfigStore<B: ConfigBackend> {
    core: Arc<StoreCore<B>>,
}

struct StoreCore<B: ConfigBackend> {
    backend: B,
    cache: BoundedCache<u64, GuildConfig>,
    this: Weak<dyn PersistSink>,
}

impl<B: ConfigBackend> CachedConfigStore<B> {
    pub fn new(backend: B, cache_config: CacheConfig) -> Self {
        let cache = BoundedCache::new(format!("guild_configs.{}", backend.kind()), cache_config);
        let core = Arc::new_cyclic(|weak: &Weak<StoreCore<B>>| {
            let this: Weak<dyn PersistSink> = weak.clone();
            StoreCore {
                backend,
                cache,
                this,
            }
        });
        Self { core }
    }

    /// The raw backend behind the cache.
    pub fn backend(&self) -> &B {
        &self.core.backend
    }

    pub fn cache(&self) -> &BoundedCache<u64, GuildConfig> {
        &self.core.cache
    }
}

impl<B: ConfigBackend> StoreCore<B> {
    fn load_or_create(&self, tenant_id: u64) -> StoreResult<GuildSettings> {
        match self.backend.fetch(tenant_id) {
            Ok(Some(settings)) => Ok(settings),
            Ok(None) => self.create(tenant_id),
            Err(e) => {
                warn!(
                    "Failed to fetch config for guild {} from {}, treating as absent: {}",
                    tenant_id,
                    self.backend.describe(),
                    e
                );
                self.create(tenant_id)
            }
        }
    }

    fn create(&self, tenant_id: u64) -> StoreResult<GuildSettings> {
        let settings = self.backend.create(tenant_id).inspect_err(|e| {
            error!(
                "Could not create config entry for guild {} in {}: {}",
                tenant_id,
                self.backend.describe(),
                e
            );
        })?;
        info!("Created config for guild {} in {}", tenant_id, self.backend.describe());
        Ok(settings)
    }

    fn attach(&self, settings: GuildSettings) -> GuildConfig {
        GuildConfig::attached(settings, self.this.clone())
    }
}

impl<B: ConfigBackend> PersistSink for StoreCore<B> {
    fn persist(&self, config: &GuildConfig) -> StoreResult<()> {
        let snapshot = config.snapshot();
        self.backend.store(&snapshot).inspect_err(|e| {
            error!(
                "Could not persist config for guild {} to {}: {}",
                snapshot.tenant_id(),
                self.backend.describe(),
                e
            );
        })?;

        // A handle from `get_all` is not the cached instance. Evict instead of
        // copying so unsaved edits on the cached handle are left alone.
        if let Some(cached) = self.cache.peek(&snapshot.tenant_id())
            && !cached.ptr_eq(config)
        {
            self.cache.invalidate_settled(&snapshot.tenant_id());
        }

        debug!("Saved config for guild {}", snapshot.tenant_id());
        Ok(())
    }
}

impl<B: ConfigBackend> ConfigStore for CachedConfigStore<B> {
    fn kind(&self) -> BackendKind {
        self.core.backend.kind()
    }

    fn describe(&self) -> String {
        self.core.backend.describe()
    }

    fn get_or_create(&self, tenant_id: u64) -> StoreResult<GuildConfig> {
        let core = &self.core;
        core.cache.get_or_try_insert_with(tenant_id, || {
            core.load_or_create(tenant_id)
                .map(|settings| core.attach(settings))
        })
    }

    fn get_all(&self) -> StoreResult<Vec<GuildConfig>> {
        let all = self.core.backend.fetch_all().inspect_err(|e| {
            error!("Could not list configs in {}: {}", self.core.backend.describe(), e);
        })?;
        debug!("Loaded {} configs from {}", all.len(), self.core.backend.describe());
        Ok(all.into_iter().map(|settings| self.core.attach(settings)).collect())
    }

    fn update(&self, config: &GuildConfig) -> StoreResult<()> {
        self.core.persist(config)
    }
}

impl<B: ConfigBackend> std::fmt::Debug for CachedConfigStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedConfigStore")
            .field("backend", &self.core.backend.describe())
            .field("cache", &self.core.cache)
            .finish()
    }
}
