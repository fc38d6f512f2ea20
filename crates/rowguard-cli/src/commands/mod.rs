//! CLI command implementations.
//!
//! Each command returns `Ok(true)` on success, `Ok(false)` when the answer is
//! negative (denied, not an admin), and an error when it could not run.

pub mod admin;
pub mod aggregate;
pub mod can;
pub mod check;

use anyhow::{Context, Result};
use rowguard_adapter_sql::SqlStore;
use rowguard_core::RowguardConfig;
use rowguard_policy::{AdminResolver, MemoryCache};
use std::path::Path;
use std::sync::Arc;

/// Load and validate the configuration file.
pub fn load_config(path: &Path) -> Result<RowguardConfig> {
    RowguardConfig::load_with_context(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

/// Connect to the configured database.
pub async fn connect(config: &RowguardConfig) -> Result<Arc<SqlStore>> {
    let store = SqlStore::connect(&config.database, config.access.clone())
        .await
        .context("failed to connect to the database")?;
    Ok(Arc::new(store))
}

/// Admin resolver over a fresh in-process cache.
pub fn admin_resolver(config: &RowguardConfig, store: Arc<SqlStore>) -> AdminResolver {
    AdminResolver::new(
        store,
        Arc::new(MemoryCache::new()),
        &config.access,
        &config.cache,
    )
}
