//! Permission cache configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// TTLs of the cluster-wide admin caches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of the cached administrator set.
    #[serde(default = "default_admin_set_ttl")]
    pub admin_set_ttl_secs: u64,

    /// Lifetime of a cached per-user admin flag.
    #[serde(default = "default_admin_flag_ttl")]
    pub admin_flag_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            admin_set_ttl_secs: default_admin_set_ttl(),
            admin_flag_ttl_secs: default_admin_flag_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn admin_set_ttl(&self) -> Duration {
        Duration::from_secs(self.admin_set_ttl_secs)
    }

    pub fn admin_flag_ttl(&self) -> Duration {
        Duration::from_secs(self.admin_flag_ttl_secs)
    }
}

fn default_admin_set_ttl() -> u64 {
    60 * 60
}

fn default_admin_flag_ttl() -> u64 {
    5 * 60
}
