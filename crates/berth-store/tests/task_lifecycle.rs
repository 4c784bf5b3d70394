//! End-to-end tests for the task state machine.
//!
//! These drive the public `TaskStore` operations against the in-memory KV
//! and assert the record states a client would observe at each step.

use std::sync::Arc;

use berth_core::{Error, MemoryKv};
use berth_store::clients::memory::MemoryCellClient;
use berth_store::models::{
    EnvironmentVariable, TaskDefinition, TaskFilter, TaskState, TASK_CANCELLED_REASON,
};
use berth_store::{StoreGateway, TaskStore};

fn task_definition() -> TaskDefinition {
    TaskDefinition {
        root_fs: "preloaded:trusty".into(),
        memory_mb: 256,
        disk_mb: 1024,
        action: serde_json::json!({"run": {"path": "/bin/work"}}),
        environment: vec![EnvironmentVariable {
            name: "LANG".into(),
            value: "en_US.UTF-8".into(),
        }],
    }
}

fn task_store() -> (TaskStore, Arc<MemoryCellClient>) {
    let kv = Arc::new(MemoryKv::new());
    let cells = Arc::new(MemoryCellClient::new());
    let store = TaskStore::new(StoreGateway::new(kv), cells.clone());
    (store, cells)
}

#[tokio::test]
async fn task_happy_path() {
    let (store, _cells) = task_store();

    store
        .desire_task("t1", "d", task_definition())
        .await
        .expect("desire");
    let task = store.task_by_guid("t1").await.expect("fetch");
    assert_eq!(task.state, TaskState::Pending);
    assert_eq!(task.domain, "d");
    assert_eq!(task.definition, task_definition());

    let should_start = store.start_task("t1", "cellA").await.expect("start");
    assert!(should_start);

    // Same cell starting again is an idempotent success.
    let should_start = store.start_task("t1", "cellA").await.expect("restart");
    assert!(!should_start);

    store
        .complete_task("t1", "cellA", false, "", "ok")
        .await
        .expect("complete");
    let task = store.task_by_guid("t1").await.expect("fetch");
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.result, "ok");
    assert!(!task.failed);
    assert!(task.first_completed_at.is_some());

    store.resolving_task("t1").await.expect("resolve");
    let task = store.task_by_guid("t1").await.expect("fetch");
    assert_eq!(task.state, TaskState::Resolving);

    store.delete_task("t1").await.expect("delete");
    let err = store.task_by_guid("t1").await.expect_err("should be gone");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn cancel_running_task_records_reason_and_signals_cell() {
    let (store, cells) = task_store();

    store
        .desire_task("t2", "d", task_definition())
        .await
        .expect("desire");
    store.start_task("t2", "cellA").await.expect("start");
    store.cancel_task("t2").await.expect("cancel");

    let task = store.task_by_guid("t2").await.expect("fetch");
    assert_eq!(task.state, TaskState::Completed);
    assert!(task.failed);
    assert_eq!(task.failure_reason, TASK_CANCELLED_REASON);

    assert_eq!(
        cells.cancelled().unwrap(),
        vec![("cellA".to_string(), "t2".to_string())]
    );
}

#[tokio::test]
async fn cancel_pending_task_does_not_signal_any_cell() {
    let (store, cells) = task_store();

    store
        .desire_task("t2", "d", task_definition())
        .await
        .expect("desire");
    store.cancel_task("t2").await.expect("cancel");

    let task = store.task_by_guid("t2").await.expect("fetch");
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.failure_reason, TASK_CANCELLED_REASON);
    assert!(cells.cancelled().unwrap().is_empty());
}

#[tokio::test]
async fn cell_cancel_failure_does_not_revert_persistence() {
    let (store, cells) = task_store();

    store
        .desire_task("t2", "d", task_definition())
        .await
        .expect("desire");
    store.start_task("t2", "cellA").await.expect("start");

    cells.set_failing(true).unwrap();
    store.cancel_task("t2").await.expect("cancel still succeeds");

    let task = store.task_by_guid("t2").await.expect("fetch");
    assert_eq!(task.state, TaskState::Completed);
}

#[tokio::test]
async fn resolving_a_pending_task_is_an_illegal_transition() {
    let (store, _cells) = task_store();

    store
        .desire_task("t3", "d", task_definition())
        .await
        .expect("desire");

    let err = store.resolving_task("t3").await.expect_err("should fail");
    assert!(matches!(err, Error::InvalidStateTransition { .. }));

    // The record is untouched.
    let task = store.task_by_guid("t3").await.expect("fetch");
    assert_eq!(task.state, TaskState::Pending);
}

#[tokio::test]
async fn start_from_a_different_cell_is_rejected() {
    let (store, _cells) = task_store();

    store
        .desire_task("t1", "d", task_definition())
        .await
        .expect("desire");
    store.start_task("t1", "cellA").await.expect("start");

    let err = store
        .start_task("t1", "cellB")
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::InvalidStateTransition { .. }));

    let task = store.task_by_guid("t1").await.expect("fetch");
    assert_eq!(task.cell_id, "cellA");
}

#[tokio::test]
async fn complete_requires_the_owning_cell() {
    let (store, _cells) = task_store();

    store
        .desire_task("t1", "d", task_definition())
        .await
        .expect("desire");
    store.start_task("t1", "cellA").await.expect("start");

    let err = store
        .complete_task("t1", "cellB", false, "", "ok")
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::InvalidRequest { .. }));

    let task = store.task_by_guid("t1").await.expect("fetch");
    assert_eq!(task.state, TaskState::Running);
}

#[tokio::test]
async fn complete_before_start_is_an_illegal_transition() {
    let (store, _cells) = task_store();

    store
        .desire_task("t1", "d", task_definition())
        .await
        .expect("desire");

    let err = store
        .complete_task("t1", "cellA", false, "", "ok")
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn fail_task_records_the_reason() {
    let (store, _cells) = task_store();

    store
        .desire_task("t1", "d", task_definition())
        .await
        .expect("desire");
    store.start_task("t1", "cellA").await.expect("start");
    store
        .fail_task("t1", "some failure happened")
        .await
        .expect("fail");

    let task = store.task_by_guid("t1").await.expect("fetch");
    assert_eq!(task.state, TaskState::Completed);
    assert!(task.failed);
    assert_eq!(task.failure_reason, "some failure happened");
}

#[tokio::test]
async fn delete_is_only_legal_from_resolving() {
    let (store, _cells) = task_store();

    store
        .desire_task("t1", "d", task_definition())
        .await
        .expect("desire");

    let err = store.delete_task("t1").await.expect_err("should fail");
    assert!(matches!(err, Error::InvalidStateTransition { .. }));

    store.start_task("t1", "cellA").await.expect("start");
    store
        .complete_task("t1", "cellA", false, "", "ok")
        .await
        .expect("complete");

    let err = store.delete_task("t1").await.expect_err("should fail");
    assert!(matches!(err, Error::InvalidStateTransition { .. }));

    store.resolving_task("t1").await.expect("resolve");
    store.delete_task("t1").await.expect("delete");
}

#[tokio::test]
async fn duplicate_desire_is_resource_exists() {
    let (store, _cells) = task_store();

    store
        .desire_task("t1", "d", task_definition())
        .await
        .expect("desire");
    let err = store
        .desire_task("t1", "d", task_definition())
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::ResourceExists { .. }));
}

#[tokio::test]
async fn desire_rejects_invalid_definitions() {
    let (store, _cells) = task_store();

    let mut definition = task_definition();
    definition.root_fs = String::new();

    let err = store
        .desire_task("t1", "d", definition)
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn listings_filter_by_domain_and_cell() {
    let (store, _cells) = task_store();

    store
        .desire_task("a-guid", "d1", task_definition())
        .await
        .expect("desire");
    store
        .desire_task("b-guid", "d2", task_definition())
        .await
        .expect("desire");
    store.start_task("b-guid", "b-cell").await.expect("start");

    let mut all = store.tasks(&TaskFilter::default()).await.expect("list");
    all.sort_by(|a, b| a.task_guid.cmp(&b.task_guid));
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].task_guid, "a-guid");
    assert_eq!(all[1].task_guid, "b-guid");

    let by_domain = store.tasks_by_domain("d1").await.expect("list");
    assert_eq!(by_domain.len(), 1);
    assert_eq!(by_domain[0].task_guid, "a-guid");

    let by_cell = store.tasks_by_cell_id("b-cell").await.expect("list");
    assert_eq!(by_cell.len(), 1);
    assert_eq!(by_cell[0].task_guid, "b-guid");
}

#[tokio::test]
async fn state_sequence_only_moves_forward() {
    let (store, _cells) = task_store();

    store
        .desire_task("t1", "d", task_definition())
        .await
        .expect("desire");
    store.start_task("t1", "cellA").await.expect("start");
    store
        .complete_task("t1", "cellA", false, "", "ok")
        .await
        .expect("complete");

    // Every operation that would move the task backwards is rejected.
    assert!(store.start_task("t1", "cellA").await.is_err());
    assert!(store.cancel_task("t1").await.is_err());
    assert!(store.fail_task("t1", "late").await.is_err());
    assert!(store
        .complete_task("t1", "cellA", false, "", "again")
        .await
        .is_err());

    let task = store.task_by_guid("t1").await.expect("fetch");
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.result, "ok");
}
