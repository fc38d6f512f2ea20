//! After-stage row filter tests.

use super::common::*;
use rowguard_core::{GroupPermission, OperationClass, Permission, Principal, Record};
use rowguard_policy::{Interceptor, ObjectAccessChecker, RequestContext};

fn readable_table() -> FakeStore {
    FakeStore::new().with_table("ticket", None, Permission::WORLD_READ | Permission::WORLD_WRITE)
}

fn reference_ids(rows: &[Record]) -> Vec<&str> {
    rows.iter().filter_map(|r| r.reference_id()).collect()
}

#[tokio::test]
async fn test_owner_sees_private_rows() {
    let fx = Fixture::new(readable_table());
    let rows = vec![
        row("t1", "alice", Permission::OWNER_READ),
        row("t2", "bob", Permission::OWNER_READ),
        row("t3", "bob", Permission::OWNER_READ | Permission::WORLD_READ),
    ];

    let ctx = RequestContext::new("ticket", OperationClass::Read, user("alice"));
    let out = fx.pipeline.check_after(&ctx, rows.clone()).await.unwrap();
    assert_eq!(reference_ids(&out), vec!["t1", "t3"]);

    let ctx = RequestContext::new("ticket", OperationClass::Read, Principal::anonymous());
    let out = fx.pipeline.check_after(&ctx, rows).await.unwrap();
    assert_eq!(reference_ids(&out), vec!["t3"]);
}

#[tokio::test]
async fn test_owner_deny_overrides_world_allow() {
    let fx = Fixture::new(readable_table());
    let rows = vec![row("t1", "alice", Permission::OWNER_PEEK | Permission::WORLD_READ)];

    let ctx = RequestContext::new("ticket", OperationClass::Read, user("alice"));
    assert!(fx.pipeline.check_after(&ctx, rows.clone()).await.unwrap().is_empty());

    let ctx = RequestContext::new("ticket", OperationClass::Read, user("carol"));
    assert_eq!(fx.pipeline.check_after(&ctx, rows).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_group_member_sees_shared_rows() {
    let store = readable_table().with_groups(
        "ticket",
        "t1",
        vec![GroupPermission::new("support", Permission::GROUP_READ)],
    );
    let fx = Fixture::new(store);
    let rows = vec![row("t1", "alice", Permission::OWNER_READ | Permission::GROUP_READ)];

    let ctx = RequestContext::new("ticket", OperationClass::Read, member("agent", &["support"]));
    assert_eq!(fx.pipeline.check_after(&ctx, rows.clone()).await.unwrap().len(), 1);

    let ctx = RequestContext::new("ticket", OperationClass::Read, member("agent", &["sales"]));
    assert!(fx.pipeline.check_after(&ctx, rows).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_sees_everything() {
    let fx = Fixture::new(readable_table());
    let rows = vec![
        row("t1", "alice", Permission::NONE),
        row("t2", "bob", Permission::NONE),
    ];

    let ctx = RequestContext::new("ticket", OperationClass::Read, user("root").with_admin(true));
    assert_eq!(fx.pipeline.check_after(&ctx, rows).await.unwrap().len(), 2);
    assert_eq!(fx.store.object_group_calls(), 0);
}

#[tokio::test]
async fn test_duplicate_reference_ids_evaluated_once() {
    let fx = Fixture::new(readable_table());
    let checker = ObjectAccessChecker::new(fx.resolver.clone());
    let rows = vec![
        row("t1", "alice", Permission::WORLD_READ),
        row("t1", "alice", Permission::WORLD_READ),
        row("t2", "alice", Permission::NONE),
        row("t2", "alice", Permission::NONE),
        row("t1", "alice", Permission::WORLD_READ),
    ];

    let ctx = RequestContext::new("ticket", OperationClass::Read, user("bob"));
    let out = checker.intercept_after(&ctx, rows).await.unwrap();

    assert_eq!(reference_ids(&out), vec!["t1", "t1", "t1"]);
    assert_eq!(fx.store.object_group_calls(), 2);
}

#[tokio::test]
async fn test_pipeline_after_stage_resolves_each_row_once() {
    let store = readable_table().with_groups(
        "ticket",
        "t2",
        vec![GroupPermission::new("support", Permission::GROUP_READ)],
    );
    let fx = Fixture::new(store);
    assert_eq!(fx.pipeline.len(), 2);
    let rows = vec![
        row("t1", "alice", Permission::WORLD_READ),
        row("t1", "alice", Permission::WORLD_READ),
        row("t2", "alice", Permission::GROUP_READ),
    ];

    let ctx = RequestContext::new("ticket", OperationClass::Read, member("bob", &["support"]));
    let out = fx.pipeline.check_after(&ctx, rows).await.unwrap();

    assert_eq!(reference_ids(&out), vec!["t1", "t1", "t2"]);
    assert_eq!(fx.store.object_group_calls(), 2);
    assert_eq!(ctx.owning_groups().len(), 2);
}

#[tokio::test]
async fn test_row_permission_without_request() {
    let store = readable_table().with_groups(
        "ticket",
        "t1",
        vec![GroupPermission::new("support", Permission::GROUP_READ)],
    );
    let fx = Fixture::new(store);
    let row = row("t1", "alice", Permission::OWNER_READ | Permission::GROUP_READ);

    let permission = fx.resolver.row_permission("ticket", &row).await.unwrap();
    assert!(permission.can_read(&member("agent", &["support"])));
    assert!(!permission.can_read(&user("carol")));

    fx.resolver.row_permission("ticket", &row).await.unwrap();
    assert_eq!(fx.store.object_group_calls(), 2);
}

#[tokio::test]
async fn test_before_and_after_share_lookups() {
    let fx = Fixture::new(readable_table());
    let rows = vec![row("t1", "alice", Permission::WORLD_READ | Permission::WORLD_WRITE)];

    let ctx = RequestContext::new("ticket", OperationClass::Write, user("bob"));
    let rows = fx.pipeline.check_before(&ctx, rows).await.unwrap();
    let out = fx.pipeline.check_after(&ctx, rows).await.unwrap();

    assert_eq!(reference_ids(&out), vec!["t1"]);
    assert_eq!(fx.store.object_group_calls(), 1);
}

#[tokio::test]
async fn test_rows_without_reference_id_are_judged_individually() {
    let fx = Fixture::new(readable_table());
    let checker = ObjectAccessChecker::new(fx.resolver.clone());
    let rows = vec![
        Record::new()
            .with("user_account_id", "alice")
            .with("permission", i64::from(Permission::OWNER_READ.bits())),
        Record::new()
            .with("user_account_id", "bob")
            .with("permission", i64::from(Permission::OWNER_READ.bits())),
        Record::new().with("title", "no permission columns"),
    ];

    let ctx = RequestContext::new("ticket", OperationClass::Read, user("alice"));
    let out = checker.intercept_after(&ctx, rows).await.unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get_str("user_account_id"), Some("alice"));
    assert_eq!(fx.store.object_group_calls(), 0);
}

#[tokio::test]
async fn test_write_filters_by_write_bit() {
    let fx = Fixture::new(readable_table());
    let rows = vec![
        row("t1", "alice", Permission::OWNER_READ),
        row("t2", "alice", Permission::OWNER_READ | Permission::OWNER_WRITE),
    ];

    let ctx = RequestContext::new("ticket", OperationClass::Write, user("alice"));
    let out = fx.pipeline.check_before(&ctx, rows).await.unwrap();
    assert_eq!(reference_ids(&out), vec!["t2"]);
}

#[tokio::test]
async fn test_empty_result_is_untouched() {
    let fx = Fixture::new(readable_table());
    let ctx = RequestContext::new("ticket", OperationClass::Read, user("alice"));
    assert!(fx.pipeline.check_after(&ctx, Vec::new()).await.unwrap().is_empty());
}
