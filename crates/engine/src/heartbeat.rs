// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic liveness writes and staleness checks for running workflows.

use parking_lot::Mutex;
use qm_core::{Clock, SystemClock};
use qm_storage::StateStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default interval between heartbeat writes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Writes `heartbeat_at = now` for each tracked workflow every interval.
///
/// A workflow is healthy when a write landed within twice the interval. When
/// the subsystem is disabled, `is_healthy` trusts the in-memory handle and
/// returns true unconditionally; zombies then require a manual force-stop.
pub struct HeartbeatManager<C: Clock = SystemClock> {
    store: Arc<StateStore>,
    clock: C,
    interval: Duration,
    enabled: bool,
    tasks: Mutex<HashMap<String, CancellationToken>>,
    last_beat: Arc<Mutex<HashMap<String, u64>>>,
}

impl<C: Clock> HeartbeatManager<C> {
    pub fn new(store: Arc<StateStore>, clock: C, interval: Duration, enabled: bool) -> Self {
        Self {
            store,
            clock,
            interval,
            enabled,
            tasks: Mutex::new(HashMap::new()),
            last_beat: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Begin heartbeating a workflow. Idempotent; a no-op when disabled.
    pub fn start(&self, id: &str) {
        if !self.enabled {
            return;
        }
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(id) {
            return;
        }

        // First beat lands synchronously so the workflow is healthy from the
        // moment the handle exists.
        let now = self.clock.epoch_ms();
        self.write_beat(id, now);

        let token = CancellationToken::new();
        tasks.insert(id.to_string(), token.clone());

        let id = id.to_string();
        let store = Arc::clone(&self.store);
        let clock = self.clock.clone();
        let last_beat = Arc::clone(&self.last_beat);
        let interval = self.interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let now = clock.epoch_ms();
                        match store.update_workflow_heartbeat(&id, now) {
                            Ok(()) => {
                                last_beat.lock().insert(id.clone(), now);
                            }
                            // Write failures are logged, never fatal to the run.
                            Err(e) => warn!(workflow_id = %id, error = %e, "heartbeat write failed"),
                        }
                    }
                }
            }
            debug!(workflow_id = %id, "heartbeat stopped");
        });
    }

    /// Stop heartbeating a workflow. Idempotent.
    pub fn stop(&self, id: &str) {
        if let Some(token) = self.tasks.lock().remove(id) {
            token.cancel();
        }
        self.last_beat.lock().remove(id);
    }

    /// True when a heartbeat landed within twice the interval (or the
    /// subsystem is disabled).
    pub fn is_healthy(&self, id: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let Some(last) = self.last_beat.lock().get(id).copied() else {
            return false;
        };
        self.clock.since_ms(last) <= 2 * self.interval.as_millis() as u64
    }

    /// Stop every heartbeat task.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock();
        for (_, token) in tasks.drain() {
            token.cancel();
        }
        self.last_beat.lock().clear();
    }

    fn write_beat(&self, id: &str, now: u64) {
        match self.store.update_workflow_heartbeat(id, now) {
            Ok(()) => {
                self.last_beat.lock().insert(id.to_string(), now);
            }
            Err(e) => warn!(workflow_id = %id, error = %e, "heartbeat write failed"),
        }
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
