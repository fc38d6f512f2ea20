//! Name to internal id resolution for default groups and relations.

use rowguard_core::{AccessConfig, REFERENCE_ID_COLUMN, TableInfo};
use std::collections::HashMap;

use crate::error::PolicyError;
use crate::store::PermissionStore;

/// Internal ids of the user groups with the given names.
pub async fn group_names_to_ids(
    store: &dyn PermissionStore,
    access: &AccessConfig,
    names: &[String],
) -> Result<Vec<i64>, PolicyError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let ids = store.ids_by_column(&access.group_table, "name", names).await?;
    Ok(ids)
}

/// Resolve a table's default relations, `relation name -> reference ids`,
/// to `relation name -> internal ids` of the related rows.
///
/// The related table is the relation's subject, or its object when the
/// table is itself the subject. Relations the table does not declare are
/// skipped.
pub async fn relation_names_to_ids(
    store: &dyn PermissionStore,
    table: &TableInfo,
) -> Result<HashMap<String, Vec<i64>>, PolicyError> {
    let mut resolved = HashMap::new();
    if table.default_relations.is_empty() {
        return Ok(resolved);
    }

    for (name, reference_ids) in &table.default_relations {
        let Some(relation) = table.relation(name) else {
            tracing::info!(
                table = %table.table_name,
                relation = %name,
                "default relation is not declared on the table, skipping"
            );
            continue;
        };

        let target = if relation.subject == table.table_name {
            &relation.object
        } else {
            &relation.subject
        };

        let ids = if reference_ids.is_empty() {
            Vec::new()
        } else {
            store
                .ids_by_column(target, REFERENCE_ID_COLUMN, reference_ids)
                .await?
        };
        resolved.insert(name.clone(), ids);
    }

    Ok(resolved)
}
