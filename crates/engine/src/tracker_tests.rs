// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::EngineHarness;
use qm_core::Workflow;
use qm_storage::RunningWorkflowRecord;

fn seed(harness: &EngineHarness, id: &str, status: WorkflowStatus) {
    harness
        .store
        .save(Workflow::builder().id(id).status(status).build())
        .unwrap_or_else(|e| panic!("save: {e}"));
}

#[tokio::test]
async fn start_execution_transitions_and_registers() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);

    let handle = h.tracker.start_execution("wf-1").unwrap();
    assert_eq!(handle.workflow_id().as_str(), "wf-1");

    let wf = h.store.load_by_id("wf-1").unwrap();
    assert_eq!(wf.run.status, WorkflowStatus::Running);
    assert!(wf.run.error.is_none());
    assert!(wf.run.heartbeat_at_ms.is_some());
    assert!(h.store.is_workflow_running("wf-1"));

    let record = h.store.get_running_workflow_record("wf-1").unwrap();
    assert_eq!(record.pid, Some(std::process::id()));
}

#[tokio::test]
async fn start_clears_previous_error() {
    let h = EngineHarness::new();
    harness_seed_failed(&h);
    h.tracker.start_execution("wf-1").unwrap();
    assert!(h.store.load_by_id("wf-1").unwrap().run.error.is_none());
}

fn harness_seed_failed(h: &EngineHarness) {
    h.store
        .save(
            Workflow::builder()
                .id("wf-1")
                .status(WorkflowStatus::Failed)
                .error("previous failure")
                .build(),
        )
        .unwrap_or_else(|e| panic!("save: {e}"));
}

#[tokio::test]
async fn second_start_fails_in_memory() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);

    let _handle = h.tracker.start_execution("wf-1").unwrap();
    let err = h.tracker.start_execution("wf-1").unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRunning));
    assert_eq!(err.to_string(), "workflow is already running");
}

#[tokio::test]
async fn registry_row_from_another_process_blocks_start() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    h.store
        .set_workflow_running(RunningWorkflowRecord::held_by("wf-1", 4242, "elsewhere", 1))
        .unwrap();

    let err = h.tracker.start_execution("wf-1").unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRunning));
    assert!(!h.tracker.has_handle("wf-1"));
}

#[tokio::test]
async fn start_unknown_workflow_rolls_back_registry() {
    let h = EngineHarness::new();
    let err = h.tracker.start_execution("wf-ghost").unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    // The registry insert in the same scope must not survive the rollback.
    assert!(!h.store.is_workflow_running("wf-ghost"));
}

#[tokio::test]
async fn concurrent_starts_yield_exactly_one_handle() {
    let h = std::sync::Arc::new(EngineHarness::new());
    seed(&h, "wf-1", WorkflowStatus::Pending);

    let mut joins = Vec::new();
    for _ in 0..8 {
        let h = std::sync::Arc::clone(&h);
        joins.push(tokio::task::spawn_blocking(move || {
            h.tracker.start_execution("wf-1").is_ok()
        }));
    }
    let mut winners = 0;
    for join in joins {
        if join.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn finish_execution_releases_everything() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let handle = h.tracker.start_execution("wf-1").unwrap();

    h.tracker.finish_execution("wf-1");

    assert!(handle.is_done());
    assert!(!h.tracker.has_handle("wf-1"));
    assert!(!h.store.is_workflow_running("wf-1"));
    // Finishing again is harmless.
    h.tracker.finish_execution("wf-1");
}

#[tokio::test]
async fn is_running_consults_memory_then_registry() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);

    assert!(!h.tracker.is_running("wf-1"));

    // Registry row without a handle: owned by another process.
    h.store
        .set_workflow_running(RunningWorkflowRecord::held_by("wf-1", 4242, "elsewhere", 1))
        .unwrap();
    assert!(h.tracker.is_running("wf-1"));
    h.store.clear_workflow_running("wf-1").unwrap();

    // Handle with heartbeats disabled: trusted.
    h.tracker.start_execution("wf-1").unwrap();
    assert!(h.tracker.is_running("wf-1"));
}

#[tokio::test]
async fn cancel_sets_both_levels_and_conflicts_on_repeat() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let handle = h.tracker.start_execution("wf-1").unwrap();
    let token = tokio_util::sync::CancellationToken::new();
    handle.set_exec_cancel(token.clone());

    h.tracker.cancel("wf-1").unwrap();
    assert!(handle.control().cancel_requested());
    assert!(token.is_cancelled());

    let err = h.tracker.cancel("wf-1").unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCancelled(_)));
}

#[tokio::test]
async fn cancel_without_handle_is_not_running() {
    let h = EngineHarness::new();
    assert!(matches!(h.tracker.cancel("wf-1"), Err(EngineError::NotRunning(_))));
}

#[tokio::test]
async fn pause_and_resume_toggle_the_flag() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let handle = h.tracker.start_execution("wf-1").unwrap();

    h.tracker.pause("wf-1").unwrap();
    assert!(handle.control().pause_requested());

    h.tracker.resume("wf-1").unwrap();
    assert!(!handle.control().pause_requested());
}

#[tokio::test]
async fn force_stop_fails_workflow_with_checkpoint() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let handle = h.tracker.start_execution("wf-1").unwrap();
    handle.mark_driver_finished();

    h.tracker.force_stop("wf-1", "stuck driver").await.unwrap();

    let wf = h.store.load_by_id("wf-1").unwrap();
    assert_eq!(wf.run.status, WorkflowStatus::Failed);
    assert!(wf.run.error.as_deref().unwrap_or_default().contains("stuck driver"));
    assert_eq!(wf.run.checkpoints.len(), 1);
    assert_eq!(wf.run.checkpoints[0].kind, "force_stop");
    assert!(!h.store.is_workflow_running("wf-1"));
    assert!(handle.is_done());
}

#[tokio::test]
async fn force_stop_is_idempotent() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let handle = h.tracker.start_execution("wf-1").unwrap();
    handle.mark_driver_finished();

    h.tracker.force_stop("wf-1", "first").await.unwrap();
    h.tracker.force_stop("wf-1", "second").await.unwrap();

    let wf = h.store.load_by_id("wf-1").unwrap();
    // Only the first stop transitioned; the second found a non-Running status.
    assert!(wf.run.error.as_deref().unwrap_or_default().contains("first"));
    assert_eq!(wf.run.checkpoints.len(), 1);
}

#[tokio::test]
async fn force_stop_without_handle_reconciles_registry() {
    let h = EngineHarness::new();
    h.store
        .save(Workflow::builder().id("wf-1").status(WorkflowStatus::Running).build())
        .unwrap();
    h.store
        .set_workflow_running(RunningWorkflowRecord::held_by("wf-1", 4242, "gone", 1))
        .unwrap();

    h.tracker.force_stop("wf-1", "orphaned handle").await.unwrap();

    assert!(!h.store.is_workflow_running("wf-1"));
    assert_eq!(h.store.load_by_id("wf-1").unwrap().run.status, WorkflowStatus::Failed);
}

#[tokio::test]
async fn rollback_marks_failed_with_reason() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    h.tracker.start_execution("wf-1").unwrap();

    h.tracker.rollback_execution("wf-1", "driver failed to confirm start");

    let wf = h.store.load_by_id("wf-1").unwrap();
    assert_eq!(wf.run.status, WorkflowStatus::Failed);
    assert_eq!(wf.run.error.as_deref(), Some("driver failed to confirm start"));
    assert!(!h.store.is_workflow_running("wf-1"));
}

#[tokio::test]
async fn wait_for_confirmation_needs_a_handle() {
    let h = EngineHarness::new();
    let err = h.tracker.wait_for_confirmation("wf-1").await.unwrap_err();
    assert!(matches!(err, EngineError::NotRunning(_)));
}

#[tokio::test]
async fn shutdown_drains_all_runs() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    seed(&h, "wf-2", WorkflowStatus::Pending);
    h.tracker.start_execution("wf-1").unwrap();
    h.tracker.start_execution("wf-2").unwrap();

    h.tracker.shutdown();

    assert_eq!(h.tracker.tracked_count(), 0);
    assert!(!h.store.is_workflow_running("wf-1"));
    assert!(!h.store.is_workflow_running("wf-2"));
}
