//! `rowguard can --table <t> [--user <ref>] [--group <ref>...] read|write`

use anyhow::{Context, Result};
use rowguard_core::{GroupPermission, OperationClass, Permission, Principal};
use rowguard_policy::{PermissionResolver, RequestContext, TableAccessChecker};
use std::path::Path;
use std::sync::Arc;

use super::{admin_resolver, connect, load_config};

/// Caller groups as given on the command line. Only membership matters to the
/// gate; the grant itself comes from the table's ownership record.
fn principal_groups(groups: Vec<String>) -> Vec<GroupPermission> {
    groups
        .into_iter()
        .map(|g| GroupPermission::new(g, Permission::NONE))
        .collect()
}

pub async fn run(
    path: &Path,
    table: &str,
    user: Option<&str>,
    groups: Vec<String>,
    operation: OperationClass,
) -> Result<bool> {
    let config = load_config(path)?;
    let store = connect(&config).await?;
    let admin = admin_resolver(&config, store.clone());

    let groups = principal_groups(groups);
    let ctx = match user {
        Some(user) => RequestContext::resolve(table, operation, user, groups, &admin)
            .await
            .with_context(|| format!("failed to resolve caller '{}'", user))?,
        None => RequestContext::new(
            table,
            operation,
            Principal::new(String::new(), groups),
        ),
    };

    let resolver = Arc::new(PermissionResolver::new(store, config.access.clone()));
    let allowed = TableAccessChecker::new(resolver)
        .allows(&ctx.table, ctx.operation, &ctx.principal)
        .await
        .with_context(|| format!("failed to check access to '{}'", table))?;

    println!("{}: {}", ctx, if allowed { "allowed" } else { "denied" });
    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_groups() {
        let groups = principal_groups(vec!["g-support".into(), "g-ops".into()]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].group_reference_id, "g-support");
        assert_eq!(groups[1].permission, Permission::NONE);
    }
}
