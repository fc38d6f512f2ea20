//! Administrator resolution.
//!
//! Two cache entries are involved:
//!
//! - [`ADMIN_SET_KEY`] holds the reference ids of every administrator;
//! - `admin.<user>` holds the yes/no answer for one user.
//!
//! Both are written store-if-absent. A node that loses the race returns the
//! value that won, so all nodes agree on an answer until it expires.

use rowguard_core::{AccessConfig, CacheConfig};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CacheValue, PermissionCache};
use crate::error::PolicyError;
use crate::store::PermissionStore;

/// Cache key of the administrator set.
pub const ADMIN_SET_KEY: &str = "administrator_reference_id";

/// Cache key of one user's admin flag.
pub fn admin_flag_key(user_reference_id: &str) -> String {
    format!("admin.{}", user_reference_id)
}

/// Answers "is this user an administrator" through the shared cache.
pub struct AdminResolver {
    store: Arc<dyn PermissionStore>,
    cache: Arc<dyn PermissionCache>,
    admin_group: String,
    set_ttl: Duration,
    flag_ttl: Duration,
}

impl AdminResolver {
    pub fn new(
        store: Arc<dyn PermissionStore>,
        cache: Arc<dyn PermissionCache>,
        access: &AccessConfig,
        ttls: &CacheConfig,
    ) -> Self {
        Self {
            store,
            cache,
            admin_group: access.admin_group.clone(),
            set_ttl: ttls.admin_set_ttl(),
            flag_ttl: ttls.admin_flag_ttl(),
        }
    }

    pub fn admin_group(&self) -> &str {
        &self.admin_group
    }

    /// Whether the user is a member of the administrator group.
    ///
    /// An empty reference id is never an administrator. Cache failures are
    /// logged and fall through to storage; storage failures are returned.
    pub async fn is_admin(&self, user_reference_id: &str) -> Result<bool, PolicyError> {
        if user_reference_id.is_empty() {
            return Ok(false);
        }

        let start = Instant::now();
        let key = admin_flag_key(user_reference_id);
        if let Some(flag) = self.cached(&key).await.and_then(|v| v.as_flag()) {
            tracing::trace!(user = %user_reference_id, elapsed = ?start.elapsed(), "admin flag cache hit");
            return Ok(flag);
        }

        let admins = self.admin_reference_ids().await?;
        let computed = admins.contains(user_reference_id);

        let answer = match self.store_if_absent(&key, CacheValue::Flag(computed), self.flag_ttl).await {
            Some(CacheValue::Flag(winner)) => winner,
            _ => computed,
        };

        tracing::trace!(
            user = %user_reference_id,
            is_admin = answer,
            elapsed = ?start.elapsed(),
            "admin flag resolved"
        );
        Ok(answer)
    }

    /// Reference ids of every administrator.
    pub async fn admin_reference_ids(&self) -> Result<BTreeSet<String>, PolicyError> {
        if let Some(CacheValue::ReferenceSet(set)) = self.cached(ADMIN_SET_KEY).await {
            return Ok(set);
        }

        let members = self
            .store
            .group_member_reference_ids(&self.admin_group)
            .await?;
        let computed: BTreeSet<String> = members.into_iter().collect();
        tracing::debug!(
            group = %self.admin_group,
            count = computed.len(),
            "loaded administrator set"
        );

        match self
            .store_if_absent(ADMIN_SET_KEY, CacheValue::ReferenceSet(computed.clone()), self.set_ttl)
            .await
        {
            Some(CacheValue::ReferenceSet(winner)) => Ok(winner),
            _ => Ok(computed),
        }
    }

    /// Drop the cached answer for one user, e.g. after a membership change.
    pub async fn invalidate(&self, user_reference_id: &str) -> Result<(), PolicyError> {
        self.cache.remove(&admin_flag_key(user_reference_id)).await?;
        Ok(())
    }

    /// Drop the cached administrator set.
    pub async fn invalidate_admin_set(&self) -> Result<(), PolicyError> {
        self.cache.remove(ADMIN_SET_KEY).await?;
        Ok(())
    }

    async fn cached(&self, key: &str) -> Option<CacheValue> {
        match self.cache.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "permission cache read failed");
                None
            }
        }
    }

    /// Store `value` if absent. On a lost race, returns the value that won.
    async fn store_if_absent(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Duration,
    ) -> Option<CacheValue> {
        match self.cache.put_if_absent(key, value, ttl).await {
            Ok(true) => None,
            Ok(false) => {
                tracing::debug!(key = %key, "permission cache entry already present");
                self.cached(key).await
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "permission cache write failed");
                None
            }
        }
    }
}
