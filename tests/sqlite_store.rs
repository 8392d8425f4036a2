mod common;

use chrono::{Duration, Utc};
use common::{employee, manager, purchase_order};
use process_manager::notify::BroadcastRelay;
use process_manager::process::registry::DefinitionRegistry;
use process_manager::runtime::{ApprovalRequest, InstanceStatus, Intent, StepCommand};
use process_manager::runtime::approval::RequestSubject;
use process_manager::storage::{
    ApprovalStore, Database, DefinitionStore, InstanceStore, SqliteStore,
};
use process_manager::{EngineError, ProcessEngine, Role};
use std::sync::Arc;

async fn store() -> SqliteStore {
    let database = Database::in_memory().await.unwrap();
    SqliteStore::new(&database)
}

fn request(instance_id: &str, project: &str, minutes_ago: i64) -> ApprovalRequest {
    ApprovalRequest::pending(
        &employee(),
        Intent::Step {
            instance_id: instance_id.into(),
            command: StepCommand::Finish,
            filed_at_version: 0,
        },
        format!("finish {}", instance_id),
        RequestSubject {
            project: project.into(),
            process_name: Some("Purchase order".into()),
            process_id: Some("def".into()),
            instance_name: Some(instance_id.into()),
        },
        Utc::now() - Duration::minutes(minutes_ago),
    )
}

#[tokio::test]
async fn definitions_are_created_then_overwritten_by_name() {
    let store = store().await;
    let now = Utc::now();

    let first = store.save_definition(purchase_order("ops"), now).await.unwrap();
    assert!(!first.overwritten);
    assert_eq!(first.definition.start_element, "StartEvent_1");

    let later = now + Duration::seconds(30);
    let second = store
        .save_definition(purchase_order("finance"), later)
        .await
        .unwrap();
    assert!(second.overwritten);
    assert_eq!(second.definition.id, first.definition.id);
    assert_eq!(second.definition.revision, 2);
    assert_eq!(second.definition.created_at, first.definition.created_at);
    assert_eq!(second.definition.updated_at, later);

    let fetched = store
        .get_definition(&first.definition.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, second.definition);
    assert!(store.list_definitions(Some("ops")).await.unwrap().is_empty());
    assert_eq!(store.list_definitions(Some("finance")).await.unwrap().len(), 1);

    assert!(store.delete_definition(&first.definition.id).await.unwrap());
    assert!(!store.delete_definition(&first.definition.id).await.unwrap());
    assert!(store.get_definition(&first.definition.id).await.unwrap().is_none());
}

#[tokio::test]
async fn instance_updates_are_conditional_on_version() {
    let database = Database::in_memory().await.unwrap();
    let store = Arc::new(SqliteStore::new(&database));
    let engine = ProcessEngine::new(
        store.clone(),
        Arc::new(DefinitionRegistry::new()),
        Arc::new(BroadcastRelay::new(8)),
    );
    let saved = engine
        .publish_definition(purchase_order("ops"), &manager())
        .await
        .unwrap()
        .applied()
        .unwrap();
    let instance = engine
        .create_instance(&saved.definition.id, "PO-1", &employee())
        .await
        .unwrap();

    let mut moved = instance.clone();
    moved.advance().unwrap();
    moved.version = 1;
    store.update_instance(&moved, 0).await.unwrap();

    let mut stale = instance.clone();
    stale.cancel(Utc::now()).unwrap();
    stale.version = 1;
    let err = store.update_instance(&stale, 0).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict { expected: 0, .. }));

    let mut ghost = instance.clone();
    ghost.id = "ghost".into();
    let err = store.update_instance(&ghost, 0).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));

    assert_eq!(store.get_instance(&instance.id).await.unwrap().unwrap(), moved);
}

#[tokio::test]
async fn instances_list_by_project_and_status_newest_first() {
    let database = Database::in_memory().await.unwrap();
    let store = Arc::new(SqliteStore::new(&database));
    let engine = ProcessEngine::new(
        store.clone(),
        Arc::new(DefinitionRegistry::new()),
        Arc::new(BroadcastRelay::new(8)),
    );
    let ops = engine
        .publish_definition(purchase_order("ops"), &manager())
        .await
        .unwrap()
        .applied()
        .unwrap()
        .definition;

    let older = engine.create_instance(&ops.id, "old", &employee()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let newer = engine.create_instance(&ops.id, "new", &employee()).await.unwrap();
    engine.cancel(&older.id, &manager()).await.unwrap();

    let all = store.list_instances(Some("ops"), None).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);

    let canceled = store
        .list_instances(None, Some(InstanceStatus::Canceled))
        .await
        .unwrap();
    assert_eq!(canceled.len(), 1);
    assert_eq!(canceled[0].id, older.id);
    assert!(canceled[0].completed_at.is_some());

    assert!(store.list_instances(Some("hr"), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn approvals_filter_by_role_and_projects_oldest_first() {
    let store = store().await;
    let a = request("i-a", "ops", 10);
    let b = request("i-b", "finance", 5);
    let c = request("i-c", "ops", 1);
    for r in [&c, &a, &b] {
        store.insert_approval(r).await.unwrap();
    }

    let everything = store.list_approvals(Role::Manager, &[]).await.unwrap();
    let ids: Vec<&str> = everything.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);

    let ops = store
        .list_approvals(Role::Manager, &["ops".to_string()])
        .await
        .unwrap();
    assert_eq!(ops, vec![a.clone(), c.clone()]);

    let both = store
        .list_approvals(Role::Manager, &["ops".to_string(), "finance".to_string()])
        .await
        .unwrap();
    assert_eq!(both.len(), 3);

    assert!(store.list_approvals(Role::Admin, &[]).await.unwrap().is_empty());

    assert_eq!(store.get_approval(&b.id).await.unwrap(), Some(b.clone()));
    assert!(store.delete_approval(&b.id).await.unwrap());
    assert!(!store.delete_approval(&b.id).await.unwrap());
}

#[tokio::test]
async fn registry_warms_from_stored_definitions() {
    let database = Database::in_memory().await.unwrap();
    let store = Arc::new(SqliteStore::new(&database));
    store.save_definition(purchase_order("ops"), Utc::now()).await.unwrap();
    let mut other = purchase_order("ops");
    other.name = "Travel request".into();
    store.save_definition(other, Utc::now()).await.unwrap();

    let engine = ProcessEngine::new(
        store,
        Arc::new(DefinitionRegistry::new()),
        Arc::new(BroadcastRelay::new(8)),
    );
    assert_eq!(engine.warm_registry().await.unwrap(), 2);
    assert_eq!(engine.registry().len(), 2);
}
