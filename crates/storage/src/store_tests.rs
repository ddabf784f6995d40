// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use qm_core::{Workflow, WorkflowStatus};

fn open_store(dir: &tempfile::TempDir) -> StateStore {
    StateStore::open(dir.path().join("state/state.json")).unwrap()
}

fn workflow(id: &str) -> Workflow {
    Workflow::builder().id(id).prompt(format!("prompt for {id}")).build()
}

#[test]
fn save_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    store.save(workflow("wf-1")).unwrap();
    let loaded = store.load_by_id("wf-1").unwrap();
    assert_eq!(loaded.id, "wf-1");
}

#[test]
fn load_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    assert!(matches!(store.load_by_id("wf-ghost"), Err(StoreError::NotFound(_))));
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_store(&dir);
        store.save(workflow("wf-1")).unwrap();
        store
            .set_workflow_running(RunningWorkflowRecord::local("wf-1", 10))
            .unwrap();
    }
    let store = open_store(&dir);
    assert!(store.load_by_id("wf-1").is_ok());
    assert!(store.is_workflow_running("wf-1"));
}

#[test]
fn delete_workflow_removes_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.save(workflow("wf-1")).unwrap();

    store.delete_workflow("wf-1").unwrap();
    assert!(matches!(store.load_by_id("wf-1"), Err(StoreError::NotFound(_))));
    assert!(matches!(store.delete_workflow("wf-1"), Err(StoreError::NotFound(_))));
}

#[test]
fn purge_all_clears_everything() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.save(workflow("wf-1")).unwrap();
    store
        .set_workflow_running(RunningWorkflowRecord::local("wf-1", 1))
        .unwrap();

    store.purge_all().unwrap();
    assert!(store.list_workflows().is_empty());
    assert!(store.list_running_workflows().is_empty());
}

#[test]
fn find_by_prompt_prefers_newest() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let mut old = workflow("wf-old");
    old.definition.prompt = "same".to_string();
    old.definition.created_at_ms = 1;
    let mut new = workflow("wf-new");
    new.definition.prompt = "same".to_string();
    new.definition.created_at_ms = 2;
    store.save(old).unwrap();
    store.save(new).unwrap();

    let found = store.find_by_prompt("same").unwrap();
    assert_eq!(found.id, "wf-new");
    assert!(store.find_by_prompt("other").is_none());
}

#[test]
fn running_registry_enforces_uniqueness() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    store
        .set_workflow_running(RunningWorkflowRecord::local("wf-1", 1))
        .unwrap();
    let second = store.set_workflow_running(RunningWorkflowRecord::local("wf-1", 2));
    assert!(matches!(second, Err(StoreError::WorkflowAlreadyRunning)));
    assert_eq!(second.unwrap_err().to_string(), "workflow is already running");
}

#[test]
fn clear_workflow_running_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store
        .set_workflow_running(RunningWorkflowRecord::local("wf-1", 1))
        .unwrap();

    store.clear_workflow_running("wf-1").unwrap();
    assert!(!store.is_workflow_running("wf-1"));
    // Second clear is a no-op
    store.clear_workflow_running("wf-1").unwrap();
}

#[test]
fn list_running_is_ordered_by_acquisition() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store
        .set_workflow_running(RunningWorkflowRecord::held_by("wf-b", 2, "h", 20))
        .unwrap();
    store
        .set_workflow_running(RunningWorkflowRecord::held_by("wf-a", 1, "h", 10))
        .unwrap();

    let rows = store.list_running_workflows();
    let ids: Vec<&str> = rows.iter().map(|r| r.workflow_id.as_str()).collect();
    assert_eq!(ids, vec!["wf-a", "wf-b"]);
}

#[test]
fn heartbeat_update_requires_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    assert!(matches!(
        store.update_workflow_heartbeat("wf-ghost", 1),
        Err(StoreError::NotFound(_))
    ));

    store.save(workflow("wf-1")).unwrap();
    store.update_workflow_heartbeat("wf-1", 42).unwrap();
    assert_eq!(store.load_by_id("wf-1").unwrap().run.heartbeat_at_ms, Some(42));
}

#[test]
fn zombie_detection_uses_heartbeat_age() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let mut fresh = workflow("wf-fresh");
    fresh.run.heartbeat_at_ms = Some(950);
    let mut stale = workflow("wf-stale");
    stale.run.heartbeat_at_ms = Some(100);
    store.save(fresh).unwrap();
    store.save(stale).unwrap();
    store
        .set_workflow_running(RunningWorkflowRecord::local("wf-fresh", 900))
        .unwrap();
    store
        .set_workflow_running(RunningWorkflowRecord::local("wf-stale", 100))
        .unwrap();

    let zombies = store.find_zombie_workflows(500, 1_000);
    let ids: Vec<&str> = zombies.iter().map(|r| r.workflow_id.as_str()).collect();
    assert_eq!(ids, vec!["wf-stale"]);
}

#[test]
fn atomic_scope_rolls_back_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.save(workflow("wf-1")).unwrap();

    let result: Result<(), StoreError> = store.execute_atomically(|txn| {
        txn.save(workflow("wf-2"));
        let mut wf = txn.load_by_id("wf-1")?;
        wf.run.status = WorkflowStatus::Running;
        txn.save(wf);
        Err(StoreError::NotFound("forced rollback".to_string()))
    });
    assert!(result.is_err());

    // Neither the insert nor the update landed
    assert!(matches!(store.load_by_id("wf-2"), Err(StoreError::NotFound(_))));
    assert_eq!(store.load_by_id("wf-1").unwrap().run.status, WorkflowStatus::Pending);
}

#[test]
fn atomic_scope_couples_status_and_registry() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    store.save(workflow("wf-1")).unwrap();

    store
        .execute_atomically(|txn| -> Result<(), StoreError> {
            txn.set_workflow_running(RunningWorkflowRecord::local("wf-1", 5))?;
            let mut wf = txn.load_by_id("wf-1")?;
            wf.run.status = WorkflowStatus::Running;
            txn.save(wf);
            Ok(())
        })
        .unwrap();

    assert!(store.is_workflow_running("wf-1"));
    assert_eq!(store.load_by_id("wf-1").unwrap().run.status, WorkflowStatus::Running);
}

#[test]
fn list_workflows_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let mut a = workflow("wf-a");
    a.definition.created_at_ms = 1;
    let mut b = workflow("wf-b");
    b.definition.created_at_ms = 2;
    store.save(a).unwrap();
    store.save(b).unwrap();

    let all = store.list_workflows();
    let ids: Vec<&str> = all.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec!["wf-b", "wf-a"]);
}
