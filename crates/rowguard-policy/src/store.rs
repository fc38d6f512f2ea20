//! Storage seam for access control.

use async_trait::async_trait;
use rowguard_core::{GroupPermission, Permission, StoreError, Value};

/// A row carrying owner and permission fields, as read from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipRecord {
    pub reference_id: Option<String>,
    /// Reference id of the owning user.
    pub owner_reference_id: Option<String>,
    pub permission: Permission,
}

/// Reads access-control data from the backing database.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Reference ids of every user in the named group.
    async fn group_member_reference_ids(&self, group_name: &str) -> Result<Vec<String>, StoreError>;

    /// The row of `table` whose `column` equals `value`, with its owner and permission.
    async fn ownership_record(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<OwnershipRecord>, StoreError>;

    /// Groups owning the row of `table` with the given reference id.
    async fn object_groups(
        &self,
        table: &str,
        reference_id: &str,
    ) -> Result<Vec<GroupPermission>, StoreError>;

    /// Internal ids of the rows of `table` whose `column` is one of `values`.
    async fn ids_by_column(
        &self,
        table: &str,
        column: &str,
        values: &[String],
    ) -> Result<Vec<i64>, StoreError>;

    /// Email of the first member of the named group.
    async fn group_member_email(&self, group_name: &str) -> Result<Option<String>, StoreError>;
}
