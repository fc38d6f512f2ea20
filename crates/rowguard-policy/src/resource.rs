//! Per-table resource state.

use rowguard_core::{AccessConfig, TableInfo, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::admin::AdminResolver;
use crate::error::PolicyError;
use crate::names::{group_names_to_ids, relation_names_to_ids};
use crate::store::PermissionStore;

const ADMIN_EMAIL_KEY: &str = "administrator_email_id";

/// A table together with its resolved defaults and a private context cache.
pub struct TableResource {
    table_info: TableInfo,
    store: Arc<dyn PermissionStore>,
    admin: Arc<AdminResolver>,
    default_groups: Vec<i64>,
    default_relations: HashMap<String, Vec<i64>>,
    context: RwLock<HashMap<String, Value>>,
}

impl TableResource {
    /// Resolve the table's default groups and relations to internal ids.
    ///
    /// Any lookup failure aborts construction.
    pub async fn new(
        table_info: TableInfo,
        store: Arc<dyn PermissionStore>,
        admin: Arc<AdminResolver>,
        access: &AccessConfig,
    ) -> Result<Self, PolicyError> {
        let default_groups =
            group_names_to_ids(store.as_ref(), access, &table_info.default_groups).await?;
        let default_relations = relation_names_to_ids(store.as_ref(), &table_info).await?;

        tracing::debug!(
            table = %table_info.table_name,
            groups = default_groups.len(),
            relations = default_relations.len(),
            "table resource ready"
        );

        Ok(Self {
            table_info,
            store,
            admin,
            default_groups,
            default_relations,
            context: RwLock::new(HashMap::new()),
        })
    }

    pub fn table_info(&self) -> &TableInfo {
        &self.table_info
    }

    pub fn table_name(&self) -> &str {
        &self.table_info.table_name
    }

    /// Internal ids of the groups new rows are shared with.
    pub fn default_groups(&self) -> &[i64] {
        &self.default_groups
    }

    /// Relation name to internal ids of the rows new rows are linked to.
    pub fn default_relations(&self) -> &HashMap<String, Vec<i64>> {
        &self.default_relations
    }

    pub fn put_context(&self, key: impl Into<String>, value: Value) {
        match self.context.write() {
            Ok(mut context) => {
                context.insert(key.into(), value);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(key.into(), value);
            }
        }
    }

    pub fn get_context(&self, key: &str) -> Option<Value> {
        match self.context.read() {
            Ok(context) => context.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    /// Clear the context cache.
    pub fn invalidate_context(&self) {
        match self.context.write() {
            Ok(mut context) => context.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    /// Email of the administrator account, cached after the first lookup.
    pub async fn admin_email(&self) -> Result<Option<String>, PolicyError> {
        if let Some(Value::Text(email)) = self.get_context(ADMIN_EMAIL_KEY) {
            return Ok(Some(email));
        }

        let email = self
            .store
            .group_member_email(self.admin.admin_group())
            .await?;
        if let Some(email) = &email {
            self.put_context(ADMIN_EMAIL_KEY, Value::Text(email.clone()));
        }
        Ok(email)
    }

    pub async fn is_admin(&self, user_reference_id: &str) -> Result<bool, PolicyError> {
        self.admin.is_admin(user_reference_id).await
    }
}
