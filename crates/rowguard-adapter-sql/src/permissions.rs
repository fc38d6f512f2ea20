//! [`PermissionStore`] over the conventional access-control tables.
//!
//! Every table carries `reference_id`, `user_account_id` (internal id of the
//! owner) and `permission`. Rows are shared with groups through a join table
//! named `<t>_<t>_id_has_usergroup_usergroup_id` with its own `permission`
//! column.

use async_trait::async_trait;
use rowguard_core::{
    GroupPermission, OWNER_COLUMN, PERMISSION_COLUMN, Permission, REFERENCE_ID_COLUMN, Record,
    Statement, StatementWriter, StoreError, Value,
};
use rowguard_core::sql::InvalidIdentifier;
use rowguard_policy::{OwnershipRecord, PermissionStore};

use crate::SqlStore;

fn invalid(e: InvalidIdentifier) -> StoreError {
    StoreError::query(e.to_string())
}

fn text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::Null) | None => None,
        Some(v) => Some(v.to_string()),
    }
}

fn required_text(row: &Record, column: &str) -> Result<String, StoreError> {
    text(row.get(column)).ok_or_else(|| StoreError::Decode {
        column: column.to_string(),
        message: "missing value".to_string(),
    })
}

fn required_i64(row: &Record, column: &str) -> Result<i64, StoreError> {
    match row.get(column) {
        Some(value) => value.as_i64().ok_or_else(|| StoreError::Decode {
            column: column.to_string(),
            message: format!("expected an integer, got '{}'", value),
        }),
        None => Err(StoreError::Decode {
            column: column.to_string(),
            message: "missing value".to_string(),
        }),
    }
}

impl SqlStore {
    /// `SELECT u.<column> FROM user_account u JOIN <membership> m JOIN usergroup g WHERE g.name = ?`
    fn member_statement(&self, column: &str, group_name: &str) -> Result<Statement, InvalidIdentifier> {
        let access = self.access();
        let membership = access.group_join_table(&access.user_table);

        let mut w = StatementWriter::new(self.dialect());
        w.push("SELECT ")
            .push_ident(&format!("u.{}", column))?
            .push(" AS ")
            .push_ident(column)?
            .push(" FROM ")
            .push_ident(&access.user_table)?
            .push(" u JOIN ")
            .push_ident(&membership)?
            .push(" m ON ")
            .push_ident(&format!("m.{}", access.group_join_column(&access.user_table)))?
            .push(" = u.id JOIN ")
            .push_ident(&access.group_table)?
            .push(" g ON g.id = ")
            .push_ident(&format!("m.{}", access.group_id_column()))?
            .push(" WHERE g.name = ");
        w.push_bind(Value::Text(group_name.to_string()));
        w.push(" ORDER BY u.id");
        Ok(w.finish())
    }

    fn ownership_statement(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Statement, InvalidIdentifier> {
        let access = self.access();
        let mut w = StatementWriter::new(self.dialect());
        w.push("SELECT o.reference_id AS reference_id, u.reference_id AS owner_reference_id, o.permission AS permission FROM ")
            .push_ident(table)?
            .push(" o LEFT JOIN ")
            .push_ident(&access.user_table)?
            .push(" u ON u.id = ")
            .push_ident(&format!("o.{}", OWNER_COLUMN))?
            .push(" WHERE ")
            .push_ident(&format!("o.{}", column))?
            .push(" = ");
        w.push_bind(value.clone());
        w.push(" LIMIT 1");
        Ok(w.finish())
    }

    fn object_groups_statement(
        &self,
        table: &str,
        reference_id: &str,
    ) -> Result<Statement, InvalidIdentifier> {
        let access = self.access();
        let mut w = StatementWriter::new(self.dialect());
        w.push("SELECT g.reference_id AS group_reference_id, j.reference_id AS relation_reference_id, j.permission AS permission FROM ")
            .push_ident(&access.group_join_table(table))?
            .push(" j JOIN ")
            .push_ident(&access.group_table)?
            .push(" g ON g.id = ")
            .push_ident(&format!("j.{}", access.group_id_column()))?
            .push(" JOIN ")
            .push_ident(table)?
            .push(" o ON o.id = ")
            .push_ident(&format!("j.{}", access.group_join_column(table)))?
            .push(" WHERE o.reference_id = ");
        w.push_bind(Value::Text(reference_id.to_string()));
        Ok(w.finish())
    }

    fn ids_statement(
        &self,
        table: &str,
        column: &str,
        values: &[String],
    ) -> Result<Statement, InvalidIdentifier> {
        let mut w = StatementWriter::new(self.dialect());
        w.push("SELECT id FROM ")
            .push_ident(table)?
            .push(" WHERE ")
            .push_ident(column)?
            .push(" IN ")
            .push_bind_list(values.iter().cloned().map(Value::Text));
        Ok(w.finish())
    }
}

#[async_trait]
impl PermissionStore for SqlStore {
    async fn group_member_reference_ids(&self, group_name: &str) -> Result<Vec<String>, StoreError> {
        let statement = self
            .member_statement(REFERENCE_ID_COLUMN, group_name)
            .map_err(invalid)?;
        let rows = self.fetch_all(&statement).await?;
        Ok(rows
            .iter()
            .filter_map(|row| text(row.get(REFERENCE_ID_COLUMN)))
            .collect())
    }

    async fn ownership_record(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<OwnershipRecord>, StoreError> {
        let statement = self
            .ownership_statement(table, column, value)
            .map_err(invalid)?;
        let rows = self.fetch_all(&statement).await?;
        Ok(rows.first().map(|row| OwnershipRecord {
            reference_id: text(row.get(REFERENCE_ID_COLUMN)),
            owner_reference_id: text(row.get("owner_reference_id")),
            permission: Permission::from_value(row.get(PERMISSION_COLUMN)),
        }))
    }

    async fn object_groups(
        &self,
        table: &str,
        reference_id: &str,
    ) -> Result<Vec<GroupPermission>, StoreError> {
        let statement = self
            .object_groups_statement(table, reference_id)
            .map_err(invalid)?;
        let rows = self.fetch_all(&statement).await?;
        rows.iter()
            .map(|row| -> Result<GroupPermission, StoreError> {
                Ok(GroupPermission {
                    group_reference_id: required_text(row, "group_reference_id")?,
                    relation_reference_id: text(row.get("relation_reference_id")),
                    permission: Permission::from_value(row.get(PERMISSION_COLUMN)),
                })
            })
            .collect()
    }

    async fn ids_by_column(
        &self,
        table: &str,
        column: &str,
        values: &[String],
    ) -> Result<Vec<i64>, StoreError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let statement = self.ids_statement(table, column, values).map_err(invalid)?;
        let rows = self.fetch_all(&statement).await?;
        rows.iter().map(|row| required_i64(row, "id")).collect()
    }

    async fn group_member_email(&self, group_name: &str) -> Result<Option<String>, StoreError> {
        let statement = self.member_statement("email", group_name).map_err(invalid)?;
        let rows = self.fetch_all(&statement).await?;
        Ok(rows.first().and_then(|row| text(row.get("email"))))
    }
}
