//! Permission resolution for rows and tables.

use rowguard_core::{
    AccessConfig, GroupPermission, OWNER_COLUMN, PERMISSION_COLUMN, Permission,
    PermissionInstance, Record, Value,
};
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::PolicyError;
use crate::store::PermissionStore;

/// Builds [`PermissionInstance`]s from rows and ownership records.
pub struct PermissionResolver {
    store: Arc<dyn PermissionStore>,
    access: AccessConfig,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn PermissionStore>, access: AccessConfig) -> Self {
        Self { store, access }
    }

    pub fn access(&self) -> &AccessConfig {
        &self.access
    }

    pub fn store(&self) -> &Arc<dyn PermissionStore> {
        &self.store
    }

    /// Permission of a row of `table` from its embedded owner and permission
    /// columns plus the groups owning it.
    ///
    /// The owner column is expected to hold the owner's reference id. A row
    /// without a reference id has no owning groups.
    pub async fn row_permission(
        &self,
        table: &str,
        row: &Record,
    ) -> Result<PermissionInstance, PolicyError> {
        let groups = match row.reference_id() {
            Some(reference_id) => self.store.object_groups(table, reference_id).await?,
            None => Vec::new(),
        };
        Ok(embedded_permission(row, groups))
    }

    /// Like [`row_permission`](Self::row_permission), but owning groups come
    /// from the request's lookups when this row was already seen.
    pub async fn row_permission_in(
        &self,
        ctx: &RequestContext,
        row: &Record,
    ) -> Result<PermissionInstance, PolicyError> {
        let groups = match row.reference_id() {
            Some(reference_id) => match ctx.owning_groups().get(reference_id) {
                Some(groups) => groups,
                None => {
                    let groups = self.store.object_groups(&ctx.table, reference_id).await?;
                    ctx.owning_groups().insert(reference_id, groups.clone());
                    groups
                }
            },
            None => Vec::new(),
        };
        Ok(embedded_permission(row, groups))
    }

    /// Permission of the record of `table` where `column = value`.
    ///
    /// A missing record resolves to [`Permission::NONE`] with no owner, which
    /// denies everyone except administrators.
    pub async fn object_permission_by_where(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<PermissionInstance, PolicyError> {
        let Some(record) = self.store.ownership_record(table, column, value).await? else {
            tracing::debug!(table = %table, column = %column, value = %value, "no ownership record");
            return Ok(PermissionInstance::default());
        };

        let groups = match record.reference_id.as_deref() {
            Some(reference_id) => self.store.object_groups(table, reference_id).await?,
            None => Vec::new(),
        };

        Ok(PermissionInstance::new(
            record.owner_reference_id,
            groups,
            record.permission,
        ))
    }

    /// Permission of a table as a whole, read from its ownership record.
    pub async fn table_permission(&self, table: &str) -> Result<PermissionInstance, PolicyError> {
        self.object_permission_by_where(
            &self.access.ownership_table,
            &self.access.ownership_column,
            &Value::Text(table.to_string()),
        )
        .await
    }
}

fn embedded_permission(row: &Record, groups: Vec<GroupPermission>) -> PermissionInstance {
    let owner = row
        .get_str(OWNER_COLUMN)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let permission = Permission::from_value(row.get(PERMISSION_COLUMN));
    PermissionInstance::new(owner, groups, permission)
}
