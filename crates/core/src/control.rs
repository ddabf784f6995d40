// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative pause/cancel signaling observed by the Runner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pause/cancel flag pair read by the Runner at phase boundaries.
///
/// Requests are sticky until cleared (`clear_pause`) or the run ends. Cancel
/// has no clear: once requested, the run is expected to wind down. All
/// operations are idempotent and safe to call from any thread.
#[derive(Debug, Clone, Default)]
pub struct ControlPlane {
    inner: Arc<ControlFlags>,
}

#[derive(Debug, Default)]
struct ControlFlags {
    pause: AtomicBool,
    cancel: AtomicBool,
}

impl ControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_pause(&self) {
        self.inner.pause.store(true, Ordering::SeqCst);
    }

    /// Lift a pause request, e.g. when the workflow is resumed.
    pub fn clear_pause(&self) {
        self.inner.pause.store(false, Ordering::SeqCst);
    }

    pub fn request_cancel(&self) {
        self.inner.cancel.store(true, Ordering::SeqCst);
    }

    pub fn pause_requested(&self) -> bool {
        self.inner.pause.load(Ordering::SeqCst)
    }

    pub fn cancel_requested(&self) -> bool {
        self.inner.cancel.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
