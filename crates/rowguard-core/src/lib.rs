//! # rowguard-core
//!
//! Types shared by every rowguard crate:
//!
//! - [`Value`] and [`Record`], the typed row representation exchanged with storage
//! - the owner/group/world permission model ([`Permission`], [`PermissionInstance`])
//! - table and column metadata ([`SchemaRegistry`])
//! - parameterized statements and identifier quoting ([`Statement`], [`Dialect`])
//! - the storage collaborator traits ([`store`])
//! - configuration loaded from YAML ([`config`])

pub mod config;
pub mod permission;
pub mod schema;
pub mod sql;
pub mod store;
pub mod value;

pub use config::{AccessConfig, CacheConfig, ConfigError, DatabaseConfig, RowguardConfig};
pub use permission::{
    Capability, GroupPermission, OperationClass, Permission, PermissionInstance, Principal,
};
pub use schema::{ColumnInfo, ForeignKey, Relation, SchemaRegistry, TableInfo};
pub use sql::{Dialect, Statement, StatementWriter, is_identifier, quote_ident};
pub use store::{QueryExecutor, StoreError, StoreTransaction, TransactionalStore};
pub use value::{Record, Value};

/// Column holding the stable external identifier of a record.
pub const REFERENCE_ID_COLUMN: &str = "reference_id";

/// Column holding the owning user of a record.
pub const OWNER_COLUMN: &str = "user_account_id";

/// Column holding the permission bitmask of a record.
pub const PERMISSION_COLUMN: &str = "permission";
