//! Table resource and name resolution tests.

use super::common::*;
use rowguard_core::{AccessConfig, Relation, TableInfo, Value};
use rowguard_policy::{TableResource, group_names_to_ids, relation_names_to_ids};
use std::collections::HashMap;
use std::sync::atomic::Ordering;

fn ticket_table() -> TableInfo {
    let mut table = TableInfo::new("ticket");
    table.default_groups = vec!["support".into(), "missing".into()];
    table.relations = vec![
        Relation {
            subject: "ticket".into(),
            relation: "belongs_to".into(),
            object: "project".into(),
            object_name: None,
        },
        Relation {
            subject: "comment".into(),
            relation: "belongs_to".into(),
            object: "ticket".into(),
            object_name: Some("comment".into()),
        },
    ];
    table.default_relations = HashMap::from([
        ("project".to_string(), vec!["p-ref".to_string()]),
        ("comment".to_string(), vec!["c-ref".to_string()]),
        ("watchers".to_string(), vec!["w-ref".to_string()]),
    ]);
    table
}

fn store() -> FakeStore {
    FakeStore::new()
        .with_id("usergroup", "name", "support", 7)
        .with_id("project", "reference_id", "p-ref", 11)
        .with_id("comment", "reference_id", "c-ref", 21)
}

#[tokio::test]
async fn test_group_names_to_ids() {
    let store = store();
    let ids = group_names_to_ids(&store, &AccessConfig::default(), &["support".into()])
        .await
        .unwrap();
    assert_eq!(ids, vec![7]);

    let ids = group_names_to_ids(&store, &AccessConfig::default(), &[]).await.unwrap();
    assert!(ids.is_empty());
    assert_eq!(store.id_queries.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_relation_names_to_ids() {
    let store = store();
    let resolved = relation_names_to_ids(&store, &ticket_table()).await.unwrap();

    assert_eq!(resolved.get("project"), Some(&vec![11]));
    assert_eq!(resolved.get("comment"), Some(&vec![21]));
    // not declared on the table
    assert!(!resolved.contains_key("watchers"));
}

#[tokio::test]
async fn test_relation_names_to_ids_empty_input() {
    let store = store();
    let resolved = relation_names_to_ids(&store, &TableInfo::new("ticket")).await.unwrap();
    assert!(resolved.is_empty());
    assert!(store.id_queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_table_resource_defaults() {
    let fx = Fixture::new(store().with_admin("admin-1"));
    let resource = TableResource::new(
        ticket_table(),
        fx.store.clone(),
        fx.admin.clone(),
        &AccessConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(resource.table_name(), "ticket");
    assert_eq!(resource.default_groups(), &[7]);
    assert_eq!(resource.default_relations().len(), 2);
    assert!(resource.is_admin("admin-1").await.unwrap());
    assert!(!resource.is_admin("").await.unwrap());
}

#[tokio::test]
async fn test_admin_email_is_cached() {
    let mut store = store();
    store.admin_email = Some("root@example.com".into());
    let fx = Fixture::new(store);
    let resource = TableResource::new(
        TableInfo::new("ticket"),
        fx.store.clone(),
        fx.admin.clone(),
        &AccessConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(resource.admin_email().await.unwrap().as_deref(), Some("root@example.com"));
    assert_eq!(resource.admin_email().await.unwrap().as_deref(), Some("root@example.com"));
    assert_eq!(fx.store.email_calls.load(Ordering::SeqCst), 1);

    resource.invalidate_context();
    assert_eq!(resource.get_context("administrator_email_id"), None);
    resource.admin_email().await.unwrap();
    assert_eq!(fx.store.email_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_context_cache() {
    let fx = Fixture::new(FakeStore::new());
    let resource = TableResource::new(
        TableInfo::new("ticket"),
        fx.store.clone(),
        fx.admin.clone(),
        &AccessConfig::default(),
    )
    .await
    .unwrap();

    resource.put_context("answer", Value::Int(42));
    assert_eq!(resource.get_context("answer"), Some(Value::Int(42)));
    assert_eq!(resource.get_context("question"), None);
}
