//! The before/after interceptor pipeline.
//!
//! - [`TableAccessChecker`] gates the whole table in the before stage and
//!   filters unreadable rows in the after stage.
//! - [`ObjectAccessChecker`] filters rows in both stages by the operation
//!   class of the request.
//!
//! A table-level denial is an error. A row-level denial silently removes the
//! row from the result.

use async_trait::async_trait;
use rowguard_core::{Capability, OperationClass, Principal, Record};
use std::collections::HashSet;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::PolicyError;
use crate::resolver::PermissionResolver;

/// A stage wrapped around every data operation.
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs before the operation, on its input rows.
    async fn intercept_before(
        &self,
        ctx: &RequestContext,
        rows: Vec<Record>,
    ) -> Result<Vec<Record>, PolicyError>;

    /// Runs after the operation, on its result rows.
    async fn intercept_after(
        &self,
        ctx: &RequestContext,
        rows: Vec<Record>,
    ) -> Result<Vec<Record>, PolicyError>;
}

fn capability_for(operation: OperationClass) -> Capability {
    match operation {
        OperationClass::Read => Capability::READ,
        OperationClass::Write => Capability::WRITE,
    }
}

/// Keep the rows the caller holds `cap` on.
///
/// Verdicts are remembered per reference id for the duration of the call, and
/// owning groups for the lifetime of `ctx`. Rows without a reference id are
/// judged every time.
async fn filter_rows(
    resolver: &PermissionResolver,
    ctx: &RequestContext,
    rows: Vec<Record>,
    cap: Capability,
) -> Result<Vec<Record>, PolicyError> {
    if rows.is_empty() || ctx.principal.is_admin {
        return Ok(rows);
    }

    let mut allowed: HashSet<String> = HashSet::new();
    let mut denied: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());

    for row in rows {
        let reference_id = row.reference_id().map(str::to_string);

        if let Some(id) = &reference_id {
            if allowed.contains(id) {
                kept.push(row);
                continue;
            }
            if denied.contains(id) {
                continue;
            }
        }

        let permission = resolver.row_permission_in(ctx, &row).await?;
        if permission.check(&ctx.principal, cap) {
            if let Some(id) = reference_id {
                allowed.insert(id);
            }
            kept.push(row);
        } else {
            tracing::debug!(
                table = %ctx.table,
                reference_id = ?reference_id,
                user = %ctx.principal.user_reference_id,
                "row excluded by access check"
            );
            if let Some(id) = reference_id {
                denied.insert(id);
            }
        }
    }

    Ok(kept)
}

/// Table-level gate driven by the table's ownership record.
pub struct TableAccessChecker {
    resolver: Arc<PermissionResolver>,
}

impl TableAccessChecker {
    pub fn new(resolver: Arc<PermissionResolver>) -> Self {
        Self { resolver }
    }

    /// Whether the principal may perform `operation` on `table` at all.
    pub async fn allows(
        &self,
        table: &str,
        operation: OperationClass,
        principal: &Principal,
    ) -> Result<bool, PolicyError> {
        if principal.is_admin {
            return Ok(true);
        }
        let permission = self.resolver.table_permission(table).await?;
        Ok(permission.check(principal, capability_for(operation)))
    }
}

#[async_trait]
impl Interceptor for TableAccessChecker {
    fn name(&self) -> &'static str {
        "table_access_checker"
    }

    async fn intercept_before(
        &self,
        ctx: &RequestContext,
        rows: Vec<Record>,
    ) -> Result<Vec<Record>, PolicyError> {
        if !self.allows(&ctx.table, ctx.operation, &ctx.principal).await? {
            tracing::info!(
                table = %ctx.table,
                operation = %ctx.operation,
                user = %ctx.principal.user_reference_id,
                "table access denied"
            );
            return Err(PolicyError::unauthorized(&ctx.table, ctx.operation));
        }
        Ok(rows)
    }

    async fn intercept_after(
        &self,
        ctx: &RequestContext,
        rows: Vec<Record>,
    ) -> Result<Vec<Record>, PolicyError> {
        filter_rows(&self.resolver, ctx, rows, Capability::READ).await
    }
}

/// Row-level filter driven by each row's own permission.
pub struct ObjectAccessChecker {
    resolver: Arc<PermissionResolver>,
}

impl ObjectAccessChecker {
    pub fn new(resolver: Arc<PermissionResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Interceptor for ObjectAccessChecker {
    fn name(&self) -> &'static str {
        "object_access_checker"
    }

    async fn intercept_before(
        &self,
        ctx: &RequestContext,
        rows: Vec<Record>,
    ) -> Result<Vec<Record>, PolicyError> {
        filter_rows(&self.resolver, ctx, rows, capability_for(ctx.operation)).await
    }

    async fn intercept_after(
        &self,
        ctx: &RequestContext,
        rows: Vec<Record>,
    ) -> Result<Vec<Record>, PolicyError> {
        filter_rows(&self.resolver, ctx, rows, capability_for(ctx.operation)).await
    }
}

/// Ordered list of interceptors.
#[derive(Default)]
pub struct AccessPipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl AccessPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table gate followed by the row filter.
    pub fn standard(resolver: Arc<PermissionResolver>) -> Self {
        Self::new()
            .with(Arc::new(TableAccessChecker::new(Arc::clone(&resolver))))
            .with(Arc::new(ObjectAccessChecker::new(resolver)))
    }

    pub fn with(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Run every before stage in order. The first error stops the pipeline.
    pub async fn check_before(
        &self,
        ctx: &RequestContext,
        mut rows: Vec<Record>,
    ) -> Result<Vec<Record>, PolicyError> {
        for interceptor in &self.interceptors {
            rows = interceptor.intercept_before(ctx, rows).await?;
        }
        Ok(rows)
    }

    /// Run every after stage in order.
    pub async fn check_after(
        &self,
        ctx: &RequestContext,
        mut rows: Vec<Record>,
    ) -> Result<Vec<Record>, PolicyError> {
        let before = rows.len();
        for interceptor in &self.interceptors {
            rows = interceptor.intercept_after(ctx, rows).await?;
        }
        if rows.len() != before {
            tracing::debug!(
                table = %ctx.table,
                kept = rows.len(),
                dropped = before - rows.len(),
                "after-stage filtered rows"
            );
        }
        Ok(rows)
    }

    /// Run the before stages for a request identified by an HTTP-style verb.
    ///
    /// Verbs that are neither reads nor writes are rejected as unauthorized.
    pub async fn check_method_before(
        &self,
        table: &str,
        method: &str,
        principal: Principal,
        rows: Vec<Record>,
    ) -> Result<(RequestContext, Vec<Record>), PolicyError> {
        let Some(operation) = OperationClass::from_method(method) else {
            tracing::info!(table = %table, method = %method, "unsupported method");
            return Err(PolicyError::unauthorized(table, method));
        };
        let ctx = RequestContext::new(table, operation, principal);
        let rows = self.check_before(&ctx, rows).await?;
        Ok((ctx, rows))
    }
}
