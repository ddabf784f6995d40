// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pluggable Runner boundary.
//!
//! The control plane owns lifecycle and persistence; a Runner drives the
//! phases of one workflow. Runners read the control plane at phase boundaries
//! and mutate workflow state through the store.

use async_trait::async_trait;
use qm_core::{ControlPlane, ProjectContext, Workflow};
use qm_storage::{StateStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

use crate::bus::EventBus;
use crate::EngineError;

/// Everything a runner needs for one execution.
pub struct RunnerCtx {
    pub project: ProjectContext,
    /// Snapshot loaded after the start transition committed.
    pub workflow: Workflow,
    pub store: Arc<StateStore>,
    pub bus: EventBus,
    /// Cooperative pause/cancel flags; poll at phase boundaries.
    pub control: ControlPlane,
}

/// How a run ended, other than by error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Execution produced a task plan awaiting human review.
    AwaitingReview,
    /// The runner parked at a phase boundary after a pause request.
    Paused,
}

/// Errors surfaced by a runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("workflow cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives the phases of a workflow.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Fresh run from the current phase.
    async fn run_with_state(&self, ctx: RunnerCtx) -> Result<RunOutcome, RunnerError>;

    /// Continuation of a previously paused or failed run.
    async fn resume_with_state(&self, ctx: RunnerCtx) -> Result<RunOutcome, RunnerError>;
}

/// Builds a runner for a workflow's blueprint. Supplied by the config loader.
pub trait RunnerFactory: Send + Sync {
    fn build(&self, blueprint: &str) -> Result<Arc<dyn Runner>, EngineError>;
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
