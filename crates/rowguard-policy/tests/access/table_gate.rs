//! Before-stage table gate tests.

use super::common::*;
use rowguard_core::{GroupPermission, OperationClass, Permission, Principal, Record};
use rowguard_policy::{PolicyError, RequestContext, TableAccessChecker};

#[tokio::test]
async fn test_world_readable_table_allows_anonymous_read() {
    let fx = Fixture::new(FakeStore::new().with_table("ticket", Some("owner-1"), Permission::WORLD_READ));
    let ctx = RequestContext::new("ticket", OperationClass::Read, Principal::anonymous());

    let rows = vec![Record::new().with("title", "a")];
    let out = fx.pipeline.check_before(&ctx, rows.clone()).await.unwrap();
    assert_eq!(out, rows);
}

#[tokio::test]
async fn test_world_readable_table_rejects_anonymous_write() {
    let fx = Fixture::new(FakeStore::new().with_table("ticket", Some("owner-1"), Permission::WORLD_READ));
    let ctx = RequestContext::new("ticket", OperationClass::Write, Principal::anonymous());

    let err = fx.pipeline.check_before(&ctx, Vec::new()).await.unwrap_err();
    match err {
        PolicyError::Unauthorized { table, operation } => {
            assert_eq!(table, "ticket");
            assert_eq!(operation, "write");
        }
        other => panic!("expected Unauthorized, got {:?}", other),
    }
}

#[tokio::test]
async fn test_owner_scope_decides_for_owner() {
    // the owner has no read bit even though the world has one
    let permission = Permission::OWNER_WRITE | Permission::WORLD_READ;
    let fx = Fixture::new(FakeStore::new().with_table("ticket", Some("owner-1"), permission));
    let checker = TableAccessChecker::new(fx.resolver.clone());

    assert!(!checker.allows("ticket", OperationClass::Read, &user("owner-1")).await.unwrap());
    assert!(checker.allows("ticket", OperationClass::Write, &user("owner-1")).await.unwrap());
    assert!(checker.allows("ticket", OperationClass::Read, &user("someone")).await.unwrap());
}

#[tokio::test]
async fn test_group_grant_on_table() {
    let store = FakeStore::new()
        .with_table("ticket", Some("owner-1"), Permission::GROUP_WRITE | Permission::GROUP_READ)
        .with_groups(
            "world",
            "world-ticket",
            vec![GroupPermission::new("support", Permission::GROUP_WRITE)],
        );
    let fx = Fixture::new(store);
    let checker = TableAccessChecker::new(fx.resolver.clone());

    let support = member("agent-1", &["support"]);
    assert!(checker.allows("ticket", OperationClass::Write, &support).await.unwrap());
    // the group grant does not include read
    assert!(!checker.allows("ticket", OperationClass::Read, &support).await.unwrap());
    assert!(!checker.allows("ticket", OperationClass::Write, &user("agent-2")).await.unwrap());
}

#[tokio::test]
async fn test_missing_ownership_record_denies_all_but_admins() {
    let fx = Fixture::new(FakeStore::new().with_admin("admin-1"));

    let ctx = RequestContext::new("invoice", OperationClass::Read, user("user-1"));
    let err = fx.pipeline.check_before(&ctx, Vec::new()).await.unwrap_err();
    assert!(err.is_unauthorized());

    let ctx = RequestContext::resolve("invoice", OperationClass::Write, "admin-1", Vec::new(), &fx.admin)
        .await
        .unwrap();
    assert!(ctx.principal.is_admin);
    assert!(fx.pipeline.check_before(&ctx, Vec::new()).await.is_ok());
}

#[tokio::test]
async fn test_method_mapping() {
    let fx = Fixture::new(FakeStore::new().with_table("ticket", None, Permission::WORLD_READ));

    let (ctx, _) = fx
        .pipeline
        .check_method_before("ticket", "get", Principal::anonymous(), Vec::new())
        .await
        .unwrap();
    assert_eq!(ctx.operation, OperationClass::Read);

    let err = fx
        .pipeline
        .check_method_before("ticket", "PATCH", Principal::anonymous(), Vec::new())
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());

    let err = fx
        .pipeline
        .check_method_before("ticket", "OPTIONS", Principal::anonymous(), Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "unauthorized: OPTIONS on table 'ticket'");
}

#[tokio::test]
async fn test_standard_pipeline_order() {
    let fx = Fixture::new(FakeStore::new());
    assert_eq!(
        fx.pipeline.names(),
        vec!["table_access_checker", "object_access_checker"]
    );
}
