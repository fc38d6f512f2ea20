//! Per-request access context.

use dashmap::DashMap;
use rowguard_core::{GroupPermission, OperationClass, Principal};
use std::fmt;
use std::sync::Arc;

use crate::admin::AdminResolver;
use crate::error::PolicyError;

/// Owning groups of rows already looked up during one request, keyed by
/// reference id. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct OwningGroups(Arc<DashMap<String, Vec<GroupPermission>>>);

impl OwningGroups {
    pub fn get(&self, reference_id: &str) -> Option<Vec<GroupPermission>> {
        self.0.get(reference_id).map(|groups| groups.value().clone())
    }

    pub fn insert(&self, reference_id: impl Into<String>, groups: Vec<GroupPermission>) {
        self.0.insert(reference_id.into(), groups);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Who is doing what to which table.
///
/// The context also carries the owning groups looked up so far, so every
/// stage of one request asks the store about a row at most once.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub table: String,
    pub operation: OperationClass,
    pub principal: Principal,
    owning_groups: OwningGroups,
}

impl RequestContext {
    pub fn new(table: impl Into<String>, operation: OperationClass, principal: Principal) -> Self {
        Self {
            table: table.into(),
            operation,
            principal,
            owning_groups: OwningGroups::default(),
        }
    }

    /// Build a context, resolving the caller's admin flag once.
    pub async fn resolve(
        table: impl Into<String>,
        operation: OperationClass,
        user_reference_id: impl Into<String>,
        groups: Vec<GroupPermission>,
        admin: &AdminResolver,
    ) -> Result<Self, PolicyError> {
        let user_reference_id = user_reference_id.into();
        let is_admin = admin.is_admin(&user_reference_id).await?;
        let principal = Principal::new(user_reference_id, groups).with_admin(is_admin);
        Ok(Self::new(table, operation, principal))
    }

    /// Same caller, different table. Looked-up groups are not carried over.
    pub fn for_table(&self, table: impl Into<String>) -> Self {
        Self::new(table, self.operation, self.principal.clone())
    }

    pub fn owning_groups(&self) -> &OwningGroups {
        &self.owning_groups
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let user = if self.principal.is_anonymous() {
            "anonymous"
        } else {
            self.principal.user_reference_id.as_str()
        };
        write!(f, "{} {} by {}", self.operation, self.table, user)
    }
}
