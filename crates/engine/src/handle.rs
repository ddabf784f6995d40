// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run coordination object shared between the executor, the driver task,
//! and the tracker.

use parking_lot::Mutex;
use qm_core::{ControlPlane, WorkflowId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::EngineError;

/// Coordination bundle returned by `UnifiedTracker::start_execution`.
///
/// Carries four signals: start confirmation (one-shot), start error (single
/// slot, second error discarded), done (one-shot), and the exec-cancel token,
/// which may be installed after the handle is created. All transitions are
/// idempotent.
#[derive(Clone, Debug)]
pub struct ExecutionHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    workflow_id: WorkflowId,
    control: ControlPlane,
    confirm: CancellationToken,
    done: CancellationToken,
    /// Cancelled by the driver after its own cleanup ran; force-stop waits on it.
    driver_done: CancellationToken,
    start_error: Mutex<Option<String>>,
    exec_cancel: Mutex<Option<CancellationToken>>,
    exec_cancel_requested: AtomicBool,
}

impl ExecutionHandle {
    pub fn new(workflow_id: WorkflowId) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                workflow_id,
                control: ControlPlane::new(),
                confirm: CancellationToken::new(),
                done: CancellationToken::new(),
                driver_done: CancellationToken::new(),
                start_error: Mutex::new(None),
                exec_cancel: Mutex::new(None),
                exec_cancel_requested: AtomicBool::new(false),
            }),
        }
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.inner.workflow_id
    }

    /// Cooperative pause/cancel flags observed by the Runner.
    pub fn control(&self) -> &ControlPlane {
        &self.inner.control
    }

    /// Driver entered its main loop; wake confirmation waiters. Idempotent.
    pub fn confirm_started(&self) {
        self.inner.confirm.cancel();
    }

    pub fn is_confirmed(&self) -> bool {
        self.inner.confirm.is_cancelled()
    }

    /// Publish a start failure. Single slot: the second error is discarded.
    /// Also wakes confirmation waiters so they observe the failure.
    pub fn report_error(&self, error: impl Into<String>) {
        {
            let mut slot = self.inner.start_error.lock();
            if slot.is_none() {
                *slot = Some(error.into());
            }
        }
        self.inner.confirm.cancel();
    }

    /// Final cleanup signal. Idempotent.
    pub fn mark_done(&self) {
        self.inner.done.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    /// Wait for final cleanup.
    pub async fn done(&self) {
        self.inner.done.cancelled().await;
    }

    /// Driver cleanup ran to completion. Idempotent.
    pub fn mark_driver_finished(&self) {
        self.inner.driver_done.cancel();
    }

    /// Wait (bounded) for the driver task to finish its own cleanup.
    /// Returns false when the grace period expires first.
    pub async fn wait_driver_finished(&self, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.inner.driver_done.cancelled())
            .await
            .is_ok()
    }

    /// Install the execution-context cancel token.
    ///
    /// If a cancel was already requested before the token existed, it fires
    /// immediately; a cancellation is never lost to the installation race.
    pub fn set_exec_cancel(&self, token: CancellationToken) {
        let mut slot = self.inner.exec_cancel.lock();
        if self.inner.exec_cancel_requested.load(Ordering::SeqCst) {
            token.cancel();
        }
        *slot = Some(token);
    }

    /// Interrupt blocking work in the execution context. Idempotent.
    pub fn cancel_exec(&self) {
        self.inner.exec_cancel_requested.store(true, Ordering::SeqCst);
        if let Some(token) = self.inner.exec_cancel.lock().as_ref() {
            token.cancel();
        }
    }

    /// Block until the driver confirms (or reports a start failure), bounded
    /// by `timeout`.
    pub async fn wait_confirmed(&self, timeout: Duration) -> Result<(), EngineError> {
        if tokio::time::timeout(timeout, self.inner.confirm.cancelled())
            .await
            .is_err()
        {
            return Err(EngineError::ConfirmationTimeout);
        }
        match self.inner.start_error.lock().take() {
            Some(error) => Err(EngineError::StartFailed(error)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
