// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use qm_core::{FakeClock, Workflow};

fn store_with_workflow(dir: &tempfile::TempDir, id: &str) -> Arc<StateStore> {
    let store = match StateStore::open(dir.path().join("state.json")) {
        Ok(s) => Arc::new(s),
        Err(e) => panic!("open: {e}"),
    };
    store
        .save(Workflow::builder().id(id).build())
        .unwrap_or_else(|e| panic!("save: {e}"));
    store
}

#[tokio::test]
async fn disabled_subsystem_reports_healthy() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with_workflow(&dir, "wf-1");
    let hb = HeartbeatManager::new(store, FakeClock::new(), Duration::from_secs(30), false);

    // Never started, still healthy: the handle is trusted.
    assert!(hb.is_healthy("wf-1"));
    hb.start("wf-1");
    assert!(hb.is_healthy("wf-1"));
}

#[tokio::test]
async fn start_writes_an_immediate_beat() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with_workflow(&dir, "wf-1");
    let clock = FakeClock::new();
    clock.set_epoch_ms(500);
    let hb = HeartbeatManager::new(Arc::clone(&store), clock, Duration::from_secs(60), true);

    hb.start("wf-1");
    assert_eq!(store.load_by_id("wf-1").unwrap().run.heartbeat_at_ms, Some(500));
    assert!(hb.is_healthy("wf-1"));
}

#[tokio::test]
async fn untracked_workflow_is_unhealthy() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with_workflow(&dir, "wf-1");
    let hb = HeartbeatManager::new(store, FakeClock::new(), Duration::from_secs(60), true);
    assert!(!hb.is_healthy("wf-1"));
}

#[tokio::test]
async fn staleness_flips_health() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with_workflow(&dir, "wf-1");
    let clock = FakeClock::new();
    // Interval long enough that the background task never fires in this test.
    let hb = HeartbeatManager::new(store, clock.clone(), Duration::from_secs(60), true);

    hb.start("wf-1");
    assert!(hb.is_healthy("wf-1"));

    clock.advance(Duration::from_secs(119));
    assert!(hb.is_healthy("wf-1"));

    clock.advance(Duration::from_secs(2));
    assert!(!hb.is_healthy("wf-1"));
}

#[tokio::test]
async fn periodic_beats_land_in_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with_workflow(&dir, "wf-1");
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_000);
    let hb =
        HeartbeatManager::new(Arc::clone(&store), clock.clone(), Duration::from_millis(10), true);

    hb.start("wf-1");
    clock.set_epoch_ms(2_000);

    // Wait for at least one background write at the bumped clock value.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        if store.load_by_id("wf-1").unwrap().run.heartbeat_at_ms == Some(2_000) {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "no periodic heartbeat observed");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    hb.stop("wf-1");
}

#[tokio::test]
async fn stop_and_shutdown_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_with_workflow(&dir, "wf-1");
    let hb = HeartbeatManager::new(store, FakeClock::new(), Duration::from_secs(60), true);

    hb.start("wf-1");
    hb.start("wf-1");
    hb.stop("wf-1");
    hb.stop("wf-1");
    assert!(!hb.is_healthy("wf-1"));
    hb.shutdown();
}

#[tokio::test]
async fn missing_workflow_write_failure_is_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    let store = match StateStore::open(dir.path().join("state.json")) {
        Ok(s) => Arc::new(s),
        Err(e) => panic!("open: {e}"),
    };
    let hb = HeartbeatManager::new(store, FakeClock::new(), Duration::from_secs(60), true);

    // Workflow record absent: the beat is logged and dropped, never a panic.
    hb.start("wf-ghost");
    assert!(!hb.is_healthy("wf-ghost"));
}
