// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{EngineHarness, FakeBehavior, FakeRunner, FakeRunnerFactory};
use crate::EngineError;
use qm_core::{Event, EventKind};
use qm_storage::StateStore;

fn immediate(outcome: RunOutcome) -> Option<Arc<dyn RunnerFactory>> {
    let factory: Arc<dyn RunnerFactory> = FakeRunnerFactory::immediate(outcome);
    Some(factory)
}

fn scripted(runner: &Arc<FakeRunner>) -> Option<Arc<dyn RunnerFactory>> {
    let factory: Arc<dyn RunnerFactory> = FakeRunnerFactory::new(Arc::clone(runner));
    Some(factory)
}

fn seed(h: &EngineHarness, id: &str, status: WorkflowStatus) {
    h.store
        .save(Workflow::builder().id(id).prompt("hello").status(status).build())
        .unwrap_or_else(|e| panic!("seed: {e}"));
}

async fn wait_for_status(store: &Arc<StateStore>, id: &str, status: WorkflowStatus) {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        if matches!(store.load_by_id(id), Ok(w) if w.run.status == status) {
            return;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "workflow {id} never reached {status}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn next_matching(
    rx: &mut tokio::sync::mpsc::Receiver<Event>,
    name: &str,
) -> Event {
    let deadline = Duration::from_secs(2);
    loop {
        match tokio::time::timeout(deadline, rx.recv()).await {
            Ok(Some(event)) if event.name() == name => return event,
            Ok(Some(_)) => continue,
            Ok(None) => panic!("bus closed before {name}"),
            Err(_) => panic!("no {name} event within 2s"),
        }
    }
}

#[tokio::test]
async fn run_unknown_workflow_is_not_found() {
    let h = EngineHarness::new();
    let exec = h.executor(immediate(RunOutcome::Completed));
    assert!(matches!(exec.run("wf-ghost").await, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn run_rejects_completed_workflow() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Completed);
    let exec = h.executor(immediate(RunOutcome::Completed));

    let err = exec.run("wf-1").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatus { .. }));
}

#[tokio::test]
async fn run_requires_runner_factory() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let exec = h.executor(None);

    let err = exec.run("wf-1").await.unwrap_err();
    assert!(matches!(err, EngineError::RunnerUnavailable));
    // No slot was claimed.
    assert!(!h.store.is_workflow_running("wf-1"));
}

#[tokio::test]
async fn run_completes_and_releases_slot() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let exec = h.executor(immediate(RunOutcome::Completed));

    exec.run("wf-1").await.unwrap();
    wait_for_status(&h.store, "wf-1", WorkflowStatus::Completed).await;

    let wf = h.store.load_by_id("wf-1").unwrap();
    assert_eq!(wf.run.phase, Phase::Done);
    assert!(!h.store.is_workflow_running("wf-1"));
    assert!(!h.tracker.has_handle("wf-1"));
}

#[tokio::test]
async fn run_emits_started_then_completed() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let mut rx = h.bus.subscribe();
    let exec = h.executor(immediate(RunOutcome::Completed));

    exec.run("wf-1").await.unwrap();

    let started = next_matching(&mut rx, "workflow_started").await;
    assert_eq!(started.workflow_id, "wf-1");
    assert!(matches!(started.kind, EventKind::WorkflowStarted { ref prompt } if prompt == "hello"));

    let completed = next_matching(&mut rx, "workflow_completed").await;
    assert_eq!(completed.workflow_id, "wf-1");
}

#[tokio::test]
async fn runner_failure_marks_failed() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let runner = FakeRunner::new(FakeBehavior::Fail("phase exploded".into()));
    let exec = h.executor(scripted(&runner));
    let mut rx = h.bus.subscribe();

    exec.run("wf-1").await.unwrap();
    wait_for_status(&h.store, "wf-1", WorkflowStatus::Failed).await;

    let wf = h.store.load_by_id("wf-1").unwrap();
    assert_eq!(wf.run.error.as_deref(), Some("phase exploded"));

    let failed = next_matching(&mut rx, "workflow_failed").await;
    assert!(matches!(failed.kind, EventKind::WorkflowFailed { ref error, .. } if error == "phase exploded"));
}

#[tokio::test]
async fn runner_panic_is_contained() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let runner = FakeRunner::new(FakeBehavior::Panic);
    let exec = h.executor(scripted(&runner));

    exec.run("wf-1").await.unwrap();
    wait_for_status(&h.store, "wf-1", WorkflowStatus::Failed).await;

    let wf = h.store.load_by_id("wf-1").unwrap();
    assert_eq!(wf.run.error.as_deref(), Some("runner panicked"));
    assert!(!h.store.is_workflow_running("wf-1"));
}

#[tokio::test]
async fn double_run_is_conflict() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let runner = FakeRunner::new(FakeBehavior::BlockUntilReleased);
    let exec = h.executor(scripted(&runner));

    exec.run("wf-1").await.unwrap();
    let err = exec.run("wf-1").await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyRunning));

    runner.release();
    wait_for_status(&h.store, "wf-1", WorkflowStatus::Completed).await;
}

#[tokio::test]
async fn cancel_during_run_fails_with_cancelled() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let runner = FakeRunner::new(FakeBehavior::BlockUntilReleased);
    let exec = h.executor(scripted(&runner));

    exec.run("wf-1").await.unwrap();
    h.tracker.cancel("wf-1").unwrap();
    wait_for_status(&h.store, "wf-1", WorkflowStatus::Failed).await;

    let wf = h.store.load_by_id("wf-1").unwrap();
    assert_eq!(wf.run.error.as_deref(), Some("workflow cancelled"));
}

#[tokio::test]
async fn pause_during_run_parks_the_workflow() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let runner = FakeRunner::new(FakeBehavior::BlockUntilReleased);
    let exec = h.executor(scripted(&runner));
    let mut rx = h.bus.subscribe();

    exec.run("wf-1").await.unwrap();
    h.tracker.pause("wf-1").unwrap();
    wait_for_status(&h.store, "wf-1", WorkflowStatus::Paused).await;

    next_matching(&mut rx, "workflow_paused").await;
    assert!(!h.store.is_workflow_running("wf-1"));
}

#[tokio::test]
async fn resume_uses_resume_entry_point() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Paused);
    let runner = FakeRunner::new(FakeBehavior::Immediate(RunOutcome::Completed));
    let exec = h.executor(scripted(&runner));

    exec.resume("wf-1").await.unwrap();
    wait_for_status(&h.store, "wf-1", WorkflowStatus::Completed).await;

    assert_eq!(*runner.invocations.lock(), vec!["resume"]);
}

#[tokio::test]
async fn awaiting_review_outcome_is_persisted() {
    let h = EngineHarness::new();
    seed(&h, "wf-1", WorkflowStatus::Pending);
    let exec = h.executor(immediate(RunOutcome::AwaitingReview));

    exec.run("wf-1").await.unwrap();
    wait_for_status(&h.store, "wf-1", WorkflowStatus::AwaitingReview).await;

    let wf = h.store.load_by_id("wf-1").unwrap();
    assert_eq!(wf.run.phase, Phase::Execute);
}
