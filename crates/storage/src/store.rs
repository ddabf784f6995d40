// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-backed state store with single-transaction atomic scopes.
//!
//! One store per project, persisting to `.quorum/state/state.json`. All
//! mutations flow through [`StateStore::execute_atomically`]: the closure
//! works on a copy, and commit replaces memory and disk together. A failed
//! closure or a failed disk write leaves the previous state intact. The
//! rename-over write keeps the on-disk file consistent for concurrent
//! processes reading the same project.

use crate::records::RunningWorkflowRecord;
use crate::StoreError;
use parking_lot::Mutex;
use qm_core::Workflow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Everything the store persists.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    workflows: HashMap<String, Workflow>,
    /// Registry of running workflows, keyed by workflow id.
    #[serde(default)]
    running: HashMap<String, RunningWorkflowRecord>,
}

/// Durable workflow records plus the running-workflows registry.
pub struct StateStore {
    path: PathBuf,
    inner: Mutex<PersistedState>,
}

impl StateStore {
    /// Open (or create) the store backed by the given file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let state: PersistedState = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            PersistedState::default()
        };
        tracing::debug!(
            path = %path.display(),
            workflows = state.workflows.len(),
            running = state.running.len(),
            "state store opened"
        );
        Ok(Self { path, inner: Mutex::new(state) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a transactional view; commit memory and disk together.
    ///
    /// An `Err` from the closure rolls everything back. A failed disk write
    /// also rolls back the in-memory state so memory never runs ahead of disk.
    /// The error type only needs a conversion from [`StoreError`], so callers
    /// can thread their own domain errors through the scope.
    pub fn execute_atomically<T, E>(
        &self,
        f: impl FnOnce(&mut StateTxn<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.inner.lock();
        let mut working = guard.clone();
        let out = f(&mut StateTxn { state: &mut working })?;
        write_atomic(&self.path, &working).map_err(E::from)?;
        *guard = working;
        Ok(out)
    }

    // -- workflow records --

    pub fn save(&self, workflow: Workflow) -> Result<(), StoreError> {
        self.execute_atomically(|txn| {
            txn.save(workflow);
            Ok(())
        })
    }

    pub fn load_by_id(&self, id: &str) -> Result<Workflow, StoreError> {
        self.inner.lock().load_by_id(id)
    }

    /// All workflows, newest first.
    pub fn list_workflows(&self) -> Vec<Workflow> {
        self.inner.lock().list_workflows()
    }

    pub fn delete_workflow(&self, id: &str) -> Result<(), StoreError> {
        self.execute_atomically(|txn| txn.delete_workflow(id))
    }

    /// Drop every workflow and registry row.
    pub fn purge_all(&self) -> Result<(), StoreError> {
        self.execute_atomically(|txn| {
            txn.purge_all();
            Ok(())
        })
    }

    /// Most recent workflow whose prompt matches exactly.
    pub fn find_by_prompt(&self, prompt: &str) -> Option<Workflow> {
        self.inner.lock().find_by_prompt(prompt)
    }

    // -- running registry --

    pub fn set_workflow_running(&self, record: RunningWorkflowRecord) -> Result<(), StoreError> {
        self.execute_atomically(|txn| txn.set_workflow_running(record))
    }

    pub fn clear_workflow_running(&self, id: &str) -> Result<(), StoreError> {
        self.execute_atomically(|txn| {
            txn.clear_workflow_running(id);
            Ok(())
        })
    }

    pub fn is_workflow_running(&self, id: &str) -> bool {
        self.inner.lock().is_workflow_running(id)
    }

    /// Registry rows ordered by acquisition time.
    pub fn list_running_workflows(&self) -> Vec<RunningWorkflowRecord> {
        self.inner.lock().list_running_workflows()
    }

    pub fn get_running_workflow_record(&self, id: &str) -> Option<RunningWorkflowRecord> {
        self.inner.lock().get_running_workflow_record(id)
    }

    pub fn update_workflow_heartbeat(&self, id: &str, at_ms: u64) -> Result<(), StoreError> {
        self.execute_atomically(|txn| txn.update_workflow_heartbeat(id, at_ms))
    }

    /// Registry rows whose workflow heartbeat is older than `stale_ms`.
    pub fn find_zombie_workflows(&self, stale_ms: u64, now_ms: u64) -> Vec<RunningWorkflowRecord> {
        self.inner.lock().find_zombie_workflows(stale_ms, now_ms)
    }
}

/// Transactional view handed to [`StateStore::execute_atomically`] closures.
///
/// Exposes the same operations as the store; nothing is visible outside the
/// scope until commit.
pub struct StateTxn<'a> {
    state: &'a mut PersistedState,
}

impl StateTxn<'_> {
    pub fn save(&mut self, workflow: Workflow) {
        self.state.workflows.insert(workflow.id.to_string(), workflow);
    }

    pub fn load_by_id(&self, id: &str) -> Result<Workflow, StoreError> {
        self.state.load_by_id(id)
    }

    pub fn list_workflows(&self) -> Vec<Workflow> {
        self.state.list_workflows()
    }

    pub fn delete_workflow(&mut self, id: &str) -> Result<(), StoreError> {
        if self.state.workflows.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn purge_all(&mut self) {
        self.state.workflows.clear();
        self.state.running.clear();
    }

    pub fn find_by_prompt(&self, prompt: &str) -> Option<Workflow> {
        self.state.find_by_prompt(prompt)
    }

    pub fn set_workflow_running(&mut self, record: RunningWorkflowRecord) -> Result<(), StoreError> {
        let key = record.workflow_id.to_string();
        if self.state.running.contains_key(&key) {
            return Err(StoreError::WorkflowAlreadyRunning);
        }
        self.state.running.insert(key, record);
        Ok(())
    }

    /// Idempotent: clearing an absent row is a no-op.
    pub fn clear_workflow_running(&mut self, id: &str) {
        self.state.running.remove(id);
    }

    pub fn is_workflow_running(&self, id: &str) -> bool {
        self.state.running.contains_key(id)
    }

    pub fn list_running_workflows(&self) -> Vec<RunningWorkflowRecord> {
        self.state.list_running_workflows()
    }

    pub fn get_running_workflow_record(&self, id: &str) -> Option<RunningWorkflowRecord> {
        self.state.running.get(id).cloned()
    }

    pub fn update_workflow_heartbeat(&mut self, id: &str, at_ms: u64) -> Result<(), StoreError> {
        let wf = self
            .state
            .workflows
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        wf.run.heartbeat_at_ms = Some(at_ms);
        Ok(())
    }
}

impl PersistedState {
    fn load_by_id(&self, id: &str) -> Result<Workflow, StoreError> {
        self.workflows
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list_workflows(&self) -> Vec<Workflow> {
        let mut all: Vec<Workflow> = self.workflows.values().cloned().collect();
        all.sort_by(|a, b| {
            b.definition
                .created_at_ms
                .cmp(&a.definition.created_at_ms)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        all
    }

    fn find_by_prompt(&self, prompt: &str) -> Option<Workflow> {
        self.workflows
            .values()
            .filter(|w| w.definition.prompt == prompt)
            .max_by_key(|w| w.definition.created_at_ms)
            .cloned()
    }

    fn is_workflow_running(&self, id: &str) -> bool {
        self.running.contains_key(id)
    }

    fn get_running_workflow_record(&self, id: &str) -> Option<RunningWorkflowRecord> {
        self.running.get(id).cloned()
    }

    fn list_running_workflows(&self) -> Vec<RunningWorkflowRecord> {
        let mut rows: Vec<RunningWorkflowRecord> = self.running.values().cloned().collect();
        rows.sort_by(|a, b| {
            a.acquired_at_ms
                .cmp(&b.acquired_at_ms)
                .then_with(|| a.workflow_id.as_str().cmp(b.workflow_id.as_str()))
        });
        rows
    }

    fn find_zombie_workflows(&self, stale_ms: u64, now_ms: u64) -> Vec<RunningWorkflowRecord> {
        self.running
            .values()
            .filter(|rec| {
                let last = self
                    .workflows
                    .get(rec.workflow_id.as_str())
                    .and_then(|w| w.run.heartbeat_at_ms)
                    .unwrap_or(rec.acquired_at_ms);
                now_ms.saturating_sub(last) > stale_ms
            })
            .cloned()
            .collect()
    }
}

/// Serialize and rename into place: temp file in the same directory, fsync,
/// rename over the target, fsync the directory.
fn write_atomic(path: &Path, state: &PersistedState) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            // Directory fsync is best-effort; some filesystems refuse it.
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
