// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! qm-engine: Execution control plane: tracker, executor, heartbeats,
//! task mutations, and orphan recovery.

pub mod bus;
pub mod executor;
pub mod handle;
pub mod heartbeat;
pub mod reaper;
pub mod runner;
pub mod tasks;
pub mod tracker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use bus::{EventBus, DEFAULT_EVENT_BUFFER};
pub use executor::{ExecutorConfig, StartMode, WorkflowExecutor};
pub use handle::ExecutionHandle;
pub use heartbeat::HeartbeatManager;
pub use reaper::OrphanReaper;
pub use runner::{RunOutcome, Runner, RunnerCtx, RunnerError, RunnerFactory};
pub use tasks::{CreateTask, TaskError, TaskMutationEngine, UpdateTask};
pub use tracker::{TrackerConfig, UnifiedTracker};

use qm_storage::StoreError;
use thiserror::Error;

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A handle or registry row already exists for the workflow.
    #[error("workflow is already running")]
    AlreadyRunning,

    #[error("workflow not found: {0}")]
    NotFound(String),

    #[error("workflow {id} cannot {operation} while {status}")]
    InvalidStatus {
        id: String,
        operation: &'static str,
        status: String,
    },

    #[error("workflow {0} is not running")]
    NotRunning(String),

    #[error("workflow {0} is already cancelled")]
    AlreadyCancelled(String),

    #[error("no runner factory configured")]
    RunnerUnavailable,

    #[error("unknown blueprint: {0}")]
    UnknownBlueprint(String),

    #[error("timed out waiting for execution start")]
    ConfirmationTimeout,

    #[error("execution start failed: {0}")]
    StartFailed(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::WorkflowAlreadyRunning => EngineError::AlreadyRunning,
            StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Store(other),
        }
    }
}
