//! Shared, mutable handle to one guild's settings.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::{GuildSettings, StoreError, StoreResult, SubscriptionError, SubscriptionToggle};

/// Write-through target for [`GuildConfig::update`].
pub(crate) trait PersistSink: Send + Sync {
    fn persist(&self, config: &GuildConfig) -> StoreResult<()>;
}

/// A guild's configuration as handed out by a [`ConfigStore`](super::ConfigStore).
///
/// Clones share state: every caller that fetched the same guild through the
/// same store's cache sees the same instance. Setters only change memory;
/// call [`update`](Self::update) to persist.
#[derive(Clone)]
pub struct GuildConfig {
    inner: Arc<Shared>,
}

struct Shared {
    tenant_id: u64,
    settings: RwLock<GuildSettings>,
    sink: Weak<dyn PersistSink>,
}

impl GuildConfig {
    pub(crate) fn attached(settings: GuildSettings, sink: Weak<dyn PersistSink>) -> Self {
        Self {
            inner: Arc::new(Shared {
                tenant_id: settings.tenant_id(),
                settings: RwLock::new(settings),
                sink,
            }),
        }
    }

    pub fn tenant_id(&self) -> u64 {
        self.inner.tenant_id
    }

    /// Copy of the current field values.
    pub fn snapshot(&self) -> GuildSettings {
        self.inner.settings.read().clone()
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &GuildConfig) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn announcer_role_ids(&self) -> BTreeSet<u64> {
        self.inner.settings.read().announcer_role_ids().clone()
    }

    pub fn announcement_role_ids(&self) -> BTreeSet<u64> {
        self.inner.settings.read().announcement_role_ids().clone()
    }

    pub fn subscriptions_enabled(&self) -> bool {
        self.inner.settings.read().subscriptions_enabled()
    }

    pub fn is_announcer_role(&self, role_id: u64) -> bool {
        self.inner.settings.read().is_announcer_role(role_id)
    }

    pub fn is_announcement_role(&self, role_id: u64) -> bool {
        self.inner.settings.read().is_announcement_role(role_id)
    }

    pub fn is_announcer(&self, member_role_ids: impl IntoIterator<Item = u64>) -> bool {
        self.inner.settings.read().is_announcer(member_role_ids)
    }

    pub fn plan_subscription_toggle(
        &self,
        requested: impl IntoIterator<Item = u64>,
        member_role_ids: &BTreeSet<u64>,
    ) -> Result<SubscriptionToggle, SubscriptionError> {
        self.inner
            .settings
            .read()
            .plan_subscription_toggle(requested, member_role_ids)
    }

    pub fn add_announcer_role(&self, role_id: u64) -> bool {
        self.inner.settings.write().add_announcer_role(role_id)
    }

    pub fn remove_announcer_role(&self, role_id: u64) -> bool {
        self.inner.settings.write().remove_announcer_role(role_id)
    }

    pub fn add_announcement_role(&self, role_id: u64) -> bool {
        self.inner.settings.write().add_announcement_role(role_id)
    }

    pub fn remove_announcement_role(&self, role_id: u64) -> bool {
        self.inner.settings.write().remove_announcement_role(role_id)
    }

    pub fn set_subscriptions_enabled(&self, enabled: bool) {
        self.inner.settings.write().set_subscriptions_enabled(enabled);
    }

    /// Overwrite every mutable field from `other`, keeping this guild's id.
    pub fn copy_from(&self, other: &GuildSettings) {
        self.inner.settings.write().copy_from(other);
    }

    /// Persist the current field values through the owning store.
    ///
    /// Safe to call redundantly; writing unchanged values is a no-op on the
    /// persisted state.
    pub fn update(&self) -> StoreResult<()> {
        let sink = self
            .inner
            .sink
            .upgrade()
            .ok_or(StoreError::Closed(self.inner.tenant_id))?;
        sink.persist(self)
    }
}

impl std::fmt::Debug for GuildConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildConfig")
            .field("settings", &*self.inner.settings.read())
            .finish()
    }
}
