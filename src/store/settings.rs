//! The persisted per-guild record.
//!
//! Role id sets are unbounded; a guild with thousands of announcer roles is
//! stored as-is.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings for a single guild.
///
/// `tenant_id` is fixed at construction and doubles as the storage key.
/// Mutating a value never persists it; that is the job of
/// [`GuildConfig::update`](super::GuildConfig::update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildSettings {
    tenant_id: u64,
    announcer_role_ids: BTreeSet<u64>,
    announcement_role_ids: BTreeSet<u64>,
    subscriptions_enabled: bool,
}

/// Why a subscription request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("subscriptions are not enabled for this server")]
    SubscriptionsDisabled,

    /// Requested roles that are not announcement roles.
    #[error("roles not available for subscription: {0:?}")]
    UnavailableRoles(Vec<u64>),
}

/// Role changes needed to toggle a member's subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionToggle {
    /// Roles the member does not hold yet.
    pub add: Vec<u64>,
    /// Roles the member already holds.
    pub remove: Vec<u64>,
}

impl GuildSettings {
    /// Create default settings: no roles, subscriptions disabled.
    pub fn new(tenant_id: u64) -> Self {
        Self {
            tenant_id,
            announcer_role_ids: BTreeSet::new(),
            announcement_role_ids: BTreeSet::new(),
            subscriptions_enabled: false,
        }
    }

    /// Rebuild settings from stored field values.
    pub fn from_parts(
        tenant_id: u64,
        announcer_role_ids: impl IntoIterator<Item = u64>,
        announcement_role_ids: impl IntoIterator<Item = u64>,
        subscriptions_enabled: bool,
    ) -> Self {
        Self {
            tenant_id,
            announcer_role_ids: announcer_role_ids.into_iter().collect(),
            announcement_role_ids: announcement_role_ids.into_iter().collect(),
            subscriptions_enabled,
        }
    }

    pub fn tenant_id(&self) -> u64 {
        self.tenant_id
    }

    pub fn announcer_role_ids(&self) -> &BTreeSet<u64> {
        &self.announcer_role_ids
    }

    pub fn announcement_role_ids(&self) -> &BTreeSet<u64> {
        &self.announcement_role_ids
    }

    pub fn subscriptions_enabled(&self) -> bool {
        self.subscriptions_enabled
    }

    pub fn is_announcer_role(&self, role_id: u64) -> bool {
        self.announcer_role_ids.contains(&role_id)
    }

    pub fn is_announcement_role(&self, role_id: u64) -> bool {
        self.announcement_role_ids.contains(&role_id)
    }

    /// Check if a member holding `member_role_ids` may announce.
    pub fn is_announcer(&self, member_role_ids: impl IntoIterator<Item = u64>) -> bool {
        member_role_ids
            .into_iter()
            .any(|role_id| self.is_announcer_role(role_id))
    }

    /// Add an announcer role. Returns `false` if it was already present.
    pub fn add_announcer_role(&mut self, role_id: u64) -> bool {
        self.announcer_role_ids.insert(role_id)
    }

    /// Remove an announcer role. Returns `false` if it was not present.
    pub fn remove_announcer_role(&mut self, role_id: u64) -> bool {
        self.announcer_role_ids.remove(&role_id)
    }

    /// Add an announcement role. Returns `false` if it was already present.
    pub fn add_announcement_role(&mut self, role_id: u64) -> bool {
        self.announcement_role_ids.insert(role_id)
    }

    /// Remove an announcement role. Returns `false` if it was not present.
    pub fn remove_announcement_role(&mut self, role_id: u64) -> bool {
        self.announcement_role_ids.remove(&role_id)
    }

    pub fn set_subscriptions_enabled(&mut self, enabled: bool) {
        self.subscriptions_enabled = enabled;
    }

    /// Overwrite every mutable field from `other`. The tenant id is kept.
    pub fn copy_from(&mut self, other: &GuildSettings) {
        self.announcer_role_ids = other.announcer_role_ids.clone();
        self.announcement_role_ids = other.announcement_role_ids.clone();
        self.subscriptions_enabled = other.subscriptions_enabled;
    }

    /// Work out which roles to grant and revoke when a member toggles
    /// subscriptions to `requested`.
    ///
    /// Every requested role must be an announcement role; roles the member
    /// already holds are removed, the rest are added.
    pub fn plan_subscription_toggle(
        &self,
        requested: impl IntoIterator<Item = u64>,
        member_role_ids: &BTreeSet<u64>,
    ) -> Result<SubscriptionToggle, SubscriptionError> {
        if !self.subscriptions_enabled {
            return Err(SubscriptionError::SubscriptionsDisabled);
        }

        let requested: BTreeSet<u64> = requested.into_iter().collect();
        let unavailable: Vec<u64> = requested
            .iter()
            .copied()
            .filter(|role_id| !self.is_announcement_role(*role_id))
            .collect();
        if !unavailable.is_empty() {
            return Err(SubscriptionError::UnavailableRoles(unavailable));
        }

        let (remove, add): (Vec<u64>, Vec<u64>) = requested
            .into_iter()
            .partition(|role_id| member_role_ids.contains(role_id));

        Ok(SubscriptionToggle { add, remove })
    }
}
