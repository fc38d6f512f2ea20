//! Shared fixtures: an in-memory permission store and principal helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use rowguard_core::{
    AccessConfig, CacheConfig, GroupPermission, Permission, Principal, Record, StoreError, Value,
};
use rowguard_policy::{
    AccessPipeline, AdminResolver, MemoryCache, OwnershipRecord, PermissionResolver,
    PermissionStore,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeStore {
    pub admins: Vec<String>,
    pub admin_email: Option<String>,
    /// (table, column, value) -> record
    pub ownership: HashMap<(String, String, String), OwnershipRecord>,
    /// (table, reference id) -> owning groups
    pub groups: HashMap<(String, String), Vec<GroupPermission>>,
    /// (table, column, value) -> internal id
    pub ids: HashMap<(String, String, String), i64>,
    pub object_group_calls: AtomicUsize,
    pub email_calls: AtomicUsize,
    pub id_queries: Mutex<Vec<(String, String, Vec<String>)>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, user: &str) -> Self {
        self.admins.push(user.to_string());
        self
    }

    /// Register the ownership record of a whole table.
    pub fn with_table(self, table: &str, owner: Option<&str>, permission: Permission) -> Self {
        self.with_ownership("world", "table_name", table, owner, permission)
    }

    pub fn with_ownership(
        mut self,
        table: &str,
        column: &str,
        value: &str,
        owner: Option<&str>,
        permission: Permission,
    ) -> Self {
        self.ownership.insert(
            (table.into(), column.into(), value.into()),
            OwnershipRecord {
                reference_id: Some(format!("{}-{}", table, value)),
                owner_reference_id: owner.map(str::to_string),
                permission,
            },
        );
        self
    }

    pub fn with_groups(mut self, table: &str, reference_id: &str, groups: Vec<GroupPermission>) -> Self {
        self.groups.insert((table.into(), reference_id.into()), groups);
        self
    }

    pub fn with_id(mut self, table: &str, column: &str, value: &str, id: i64) -> Self {
        self.ids.insert((table.into(), column.into(), value.into()), id);
        self
    }

    pub fn object_group_calls(&self) -> usize {
        self.object_group_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionStore for FakeStore {
    async fn group_member_reference_ids(&self, _group_name: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.admins.clone())
    }

    async fn ownership_record(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Option<OwnershipRecord>, StoreError> {
        Ok(self
            .ownership
            .get(&(table.to_string(), column.to_string(), value.to_string()))
            .cloned())
    }

    async fn object_groups(
        &self,
        table: &str,
        reference_id: &str,
    ) -> Result<Vec<GroupPermission>, StoreError> {
        self.object_group_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .groups
            .get(&(table.to_string(), reference_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn ids_by_column(
        &self,
        table: &str,
        column: &str,
        values: &[String],
    ) -> Result<Vec<i64>, StoreError> {
        self.id_queries
            .lock()
            .unwrap()
            .push((table.to_string(), column.to_string(), values.to_vec()));
        Ok(values
            .iter()
            .filter_map(|v| self.ids.get(&(table.to_string(), column.to_string(), v.clone())))
            .copied()
            .collect())
    }

    async fn group_member_email(&self, _group_name: &str) -> Result<Option<String>, StoreError> {
        self.email_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.admin_email.clone())
    }
}

pub struct Fixture {
    pub store: Arc<FakeStore>,
    pub resolver: Arc<PermissionResolver>,
    pub admin: Arc<AdminResolver>,
    pub pipeline: AccessPipeline,
}

impl Fixture {
    pub fn new(store: FakeStore) -> Self {
        let store = Arc::new(store);
        let access = AccessConfig::default();
        let resolver = Arc::new(PermissionResolver::new(store.clone(), access.clone()));
        let admin = Arc::new(AdminResolver::new(
            store.clone(),
            Arc::new(MemoryCache::new()),
            &access,
            &CacheConfig::default(),
        ));
        let pipeline = AccessPipeline::standard(Arc::clone(&resolver));
        Self {
            store,
            resolver,
            admin,
            pipeline,
        }
    }
}

pub fn user(reference_id: &str) -> Principal {
    Principal::new(reference_id, Vec::new())
}

pub fn member(reference_id: &str, groups: &[&str]) -> Principal {
    Principal::new(
        reference_id,
        groups
            .iter()
            .map(|g| GroupPermission::new(*g, Permission::NONE))
            .collect(),
    )
}

/// A row with reference id, owner and permission columns.
pub fn row(reference_id: &str, owner: &str, permission: Permission) -> Record {
    Record::new()
        .with("reference_id", reference_id)
        .with("user_account_id", owner)
        .with("permission", i64::from(permission.bits()))
}
