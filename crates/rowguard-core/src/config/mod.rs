//! Configuration types for rowguard.
//!
//! Configuration is loaded from a YAML file (`rowguard.yaml`). Table metadata
//! can be inlined under `tables` or kept in a separate file referenced by
//! `schema_file`.
//!
//! ```yaml
//! database:
//!   url_env: DATABASE_URL
//! cache:
//!   admin_set_ttl_secs: 3600
//!   admin_flag_ttl_secs: 300
//! access:
//!   admin_group: administrators
//! tables:
//!   - table_name: ticket
//!     columns:
//!       - name: status
//!       - name: project_id
//!         is_foreign_key: true
//!         foreign_key: { namespace: project }
//! ```

pub mod access;
pub mod cache;
pub mod database;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub use access::AccessConfig;
pub use cache::CacheConfig;
pub use database::DatabaseConfig;

use crate::schema::{SchemaRegistry, TableInfo};

/// Complete rowguard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowguardConfig {
    /// Storage connection.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Permission cache TTLs.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Access-control table naming.
    #[serde(default)]
    pub access: AccessConfig,

    /// Inline table metadata.
    #[serde(default)]
    pub tables: Vec<TableInfo>,

    /// File with additional table metadata (a YAML list of tables).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<PathBuf>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RowguardConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration, pull in `schema_file` relative to the config file,
    /// and validate the result.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(schema_file) = &config.schema_file {
            let schema_path = if schema_file.is_absolute() {
                schema_file.clone()
            } else {
                base_dir.join(schema_file)
            };
            let content = fs::read_to_string(&schema_path)?;
            let tables: Vec<TableInfo> = serde_yaml::from_str(&content)?;
            config.tables.extend(tables);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check table metadata for consistency.
    ///
    /// Rejects duplicate table names and local foreign keys pointing at
    /// tables that are not declared.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.table_name.as_str()) {
                return Err(ConfigError::Config(format!(
                    "table '{}' is declared more than once",
                    table.table_name
                )));
            }
        }

        for table in &self.tables {
            for column in &table.columns {
                if column.is_foreign_key && column.foreign_key.is_none() {
                    return Err(ConfigError::Config(format!(
                        "column '{}.{}' is a foreign key without a target",
                        table.table_name, column.name
                    )));
                }
                if let Some(target) = column.local_target()
                    && !seen.contains(target)
                {
                    return Err(ConfigError::Config(format!(
                        "column '{}.{}' references unknown table '{}'",
                        table.table_name, column.name, target
                    )));
                }
            }
        }

        Ok(())
    }

    /// Build the schema registry from the table metadata.
    pub fn registry(&self) -> SchemaRegistry {
        SchemaRegistry::new(self.tables.iter().cloned()).with_user_table(&self.access.user_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
database:
  url: "sqlite::memory:"
cache:
  admin_flag_ttl_secs: 60
tables:
  - table_name: project
    columns:
      - name: name
  - table_name: ticket
    default_groups: [support]
    columns:
      - name: status
      - name: project_id
        is_foreign_key: true
        foreign_key:
          namespace: project
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = RowguardConfig::from_yaml(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.cache.admin_flag_ttl_secs, 60);
        assert_eq!(config.cache.admin_set_ttl_secs, 3600);
        assert_eq!(config.access.admin_group, "administrators");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(
            config.database.dialect(),
            Some(crate::sql::Dialect::Sqlite)
        );

        let registry = config.registry();
        let fk = registry.table("ticket").unwrap().column("project_id").unwrap();
        assert_eq!(fk.local_target(), Some("project"));
        assert_eq!(registry.user_table(), "user_account");
        let owner = registry.find_column("ticket", &[], "user_account_id").unwrap();
        assert_eq!(owner.local_target(), Some("user_account"));
    }

    #[test]
    fn test_validate_rejects_unknown_target() {
        let yaml = r#"
tables:
  - table_name: ticket
    columns:
      - name: owner_id
        is_foreign_key: true
        foreign_key: { namespace: person }
"#;
        let config = RowguardConfig::from_yaml(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown table 'person'"));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let yaml = r#"
tables:
  - table_name: ticket
  - table_name: ticket
"#;
        let config = RowguardConfig::from_yaml(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Config(_))));
    }

    #[test]
    fn test_load_with_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("tables.yaml");
        let mut schema = fs::File::create(&schema_path).unwrap();
        writeln!(schema, "- table_name: project\n  columns:\n    - name: name").unwrap();

        let config_path = dir.path().join("rowguard.yaml");
        fs::write(&config_path, "schema_file: tables.yaml\n").unwrap();

        let config = RowguardConfig::load_with_context(&config_path).unwrap();
        assert_eq!(config.tables.len(), 1);
        assert!(config.registry().contains("project"));
    }
}
