// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single source of truth for "is workflow X running".
//!
//! Reconciles three views: the in-memory handle map, the durable
//! running-workflows registry, and heartbeat health. Every lifecycle
//! transition goes through an atomic state-store scope so the persisted
//! status and the registry never diverge.

use parking_lot::RwLock;
use qm_core::{Clock, SystemClock, WorkflowId, WorkflowStatus};
use qm_storage::{RunningWorkflowRecord, StateStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::handle::ExecutionHandle;
use crate::heartbeat::HeartbeatManager;
use crate::EngineError;

/// Tunables for tracker timing.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Budget for the driver to confirm it entered its main loop.
    pub confirm_timeout: Duration,
    /// How long force-stop waits for the driver's own cleanup.
    pub force_stop_grace: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(5),
            force_stop_grace: Duration::from_secs(2),
        }
    }
}

/// Authority over workflow execution state.
pub struct UnifiedTracker<C: Clock = SystemClock> {
    store: Arc<StateStore>,
    heartbeat: HeartbeatManager<C>,
    clock: C,
    config: TrackerConfig,
    handles: RwLock<HashMap<String, ExecutionHandle>>,
}

impl<C: Clock> UnifiedTracker<C> {
    pub fn new(
        store: Arc<StateStore>,
        heartbeat: HeartbeatManager<C>,
        clock: C,
        config: TrackerConfig,
    ) -> Self {
        Self {
            store,
            heartbeat,
            clock,
            config,
            handles: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Claim the execution slot for a workflow.
    ///
    /// Linearizable: among concurrent callers for the same id, exactly one
    /// receives a handle. The memory check catches same-process doubles, the
    /// registry insert inside the atomic scope decides cross-process races,
    /// and the workflow transitions to Running in the same scope.
    pub fn start_execution(&self, id: &str) -> Result<ExecutionHandle, EngineError> {
        let mut handles = self.handles.write();
        if handles.contains_key(id) {
            return Err(EngineError::AlreadyRunning);
        }

        let now = self.clock.epoch_ms();
        self.store.execute_atomically(|txn| -> Result<(), StoreError> {
            if txn.is_workflow_running(id) {
                return Err(StoreError::WorkflowAlreadyRunning);
            }
            txn.set_workflow_running(RunningWorkflowRecord::local(id, now))?;
            let mut wf = txn.load_by_id(id)?;
            wf.run.status = WorkflowStatus::Running;
            wf.run.error = None;
            wf.run.updated_at_ms = now;
            wf.run.heartbeat_at_ms = Some(now);
            txn.save(wf);
            Ok(())
        })?;

        let handle = ExecutionHandle::new(WorkflowId::new(id));
        handles.insert(id.to_string(), handle.clone());
        drop(handles);

        self.heartbeat.start(id);
        info!(workflow_id = %id, "execution slot acquired");
        Ok(handle)
    }

    /// Release a finished run.
    ///
    /// Memory cleanup is unconditional; a registry failure is logged but not
    /// propagated; the process is already exiting the run.
    pub fn finish_execution(&self, id: &str) {
        let handle = self.handles.write().remove(id);
        if let Some(handle) = &handle {
            handle.mark_done();
        }
        self.heartbeat.stop(id);
        if let Err(e) = self.store.clear_workflow_running(id) {
            warn!(workflow_id = %id, error = %e, "failed to clear running registry on finish");
        }
    }

    /// Is this workflow running anywhere?
    ///
    /// Fast path: a live handle with a healthy heartbeat. An unhealthy handle
    /// is a zombie and reports not-running. Without a handle, the registry
    /// decides (it may be owned by another process).
    pub fn is_running(&self, id: &str) -> bool {
        {
            let handles = self.handles.read();
            if handles.contains_key(id) {
                return self.heartbeat.is_healthy(id);
            }
        }
        self.store.is_workflow_running(id)
    }

    pub fn get_handle(&self, id: &str) -> Option<ExecutionHandle> {
        self.handles.read().get(id).cloned()
    }

    pub fn has_handle(&self, id: &str) -> bool {
        self.handles.read().contains_key(id)
    }

    /// Request cooperative cancellation plus exec-context interruption.
    ///
    /// Cancelling an already-cancelled workflow fires a second best-effort
    /// exec cancel and reports the conflict.
    pub fn cancel(&self, id: &str) -> Result<(), EngineError> {
        let handle = self
            .get_handle(id)
            .ok_or_else(|| EngineError::NotRunning(id.to_string()))?;
        if handle.control().cancel_requested() {
            handle.cancel_exec();
            return Err(EngineError::AlreadyCancelled(id.to_string()));
        }
        handle.control().request_cancel();
        handle.cancel_exec();
        info!(workflow_id = %id, "cancel requested");
        Ok(())
    }

    /// Request a cooperative pause; the runner parks at the next phase boundary.
    pub fn pause(&self, id: &str) -> Result<(), EngineError> {
        let handle = self
            .get_handle(id)
            .ok_or_else(|| EngineError::NotRunning(id.to_string()))?;
        handle.control().request_pause();
        info!(workflow_id = %id, "pause requested");
        Ok(())
    }

    /// Lift a pause request on a live run.
    pub fn resume(&self, id: &str) -> Result<(), EngineError> {
        let handle = self
            .get_handle(id)
            .ok_or_else(|| EngineError::NotRunning(id.to_string()))?;
        handle.control().clear_pause();
        info!(workflow_id = %id, "pause lifted");
        Ok(())
    }

    /// Primary zombie-recovery operation.
    ///
    /// Tears the run down from the outside: remove the handle, cancel
    /// everything, wait briefly for the driver's own cleanup, then reconcile
    /// the registry, and transition to Failed with a `force_stop` checkpoint
    /// only if the persisted status is still Running. Idempotent.
    pub async fn force_stop(&self, id: &str, reason: &str) -> Result<(), EngineError> {
        let handle = self.handles.write().remove(id);
        if let Some(handle) = &handle {
            handle.control().request_cancel();
            handle.cancel_exec();
            handle.mark_done();
            if !handle.wait_driver_finished(self.config.force_stop_grace).await {
                warn!(workflow_id = %id, "driver did not finish within force-stop grace");
            }
        }

        self.heartbeat.stop(id);
        if let Err(e) = self.store.clear_workflow_running(id) {
            warn!(workflow_id = %id, error = %e, "failed to clear running registry on force-stop");
        }

        let now = self.clock.epoch_ms();
        let reason = reason.to_string();
        self.store.execute_atomically(move |txn| -> Result<(), StoreError> {
            let mut wf = match txn.load_by_id(id) {
                Ok(wf) => wf,
                // Workflow deleted underneath us; nothing left to reconcile.
                Err(StoreError::NotFound(_)) => return Ok(()),
                Err(e) => return Err(e),
            };
            if wf.run.status == WorkflowStatus::Running {
                wf.set_failed(format!("force-stopped: {reason}"), now);
                wf.push_checkpoint("force_stop", Some(reason.clone()), now);
                txn.save(wf);
            }
            Ok(())
        })?;
        info!(workflow_id = %id, "force-stopped");
        Ok(())
    }

    /// Undo a start whose driver failed to launch: release the slot and mark
    /// the workflow Failed with the given reason.
    pub fn rollback_execution(&self, id: &str, reason: &str) {
        self.finish_execution(id);
        let now = self.clock.epoch_ms();
        let result: Result<(), StoreError> = self.store.execute_atomically(|txn| {
            let mut wf = match txn.load_by_id(id) {
                Ok(wf) => wf,
                Err(StoreError::NotFound(_)) => return Ok(()),
                Err(e) => return Err(e),
            };
            if wf.run.status == WorkflowStatus::Running {
                wf.set_failed(reason, now);
                txn.save(wf);
            }
            Ok(())
        });
        if let Err(e) = result {
            warn!(workflow_id = %id, error = %e, "rollback transition failed");
        }
    }

    /// Turn the async start into a synchronous answer for the HTTP layer.
    pub async fn wait_for_confirmation(&self, id: &str) -> Result<(), EngineError> {
        let handle = self
            .get_handle(id)
            .ok_or_else(|| EngineError::NotRunning(id.to_string()))?;
        handle.wait_confirmed(self.config.confirm_timeout).await
    }

    /// Tear down every tracked run (process shutdown).
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.handles.read().keys().cloned().collect();
        for id in ids {
            if let Some(handle) = self.get_handle(&id) {
                handle.control().request_cancel();
                handle.cancel_exec();
            }
            self.finish_execution(&id);
        }
        self.heartbeat.shutdown();
    }

    pub fn heartbeat(&self) -> &HeartbeatManager<C> {
        &self.heartbeat
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of live in-memory handles.
    pub fn tracked_count(&self) -> usize {
        self.handles.read().len()
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
