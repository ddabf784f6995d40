// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! qm-storage: Durable workflow state and the running-workflows registry.

mod records;
mod store;

pub use records::RunningWorkflowRecord;
pub use store::{StateStore, StateTxn};

use thiserror::Error;

/// Errors from the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workflow not found: {0}")]
    NotFound(String),

    /// Cross-process mutual exclusion: a registry row already exists.
    #[error("workflow is already running")]
    WorkflowAlreadyRunning,

    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Stable machine-readable code for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "WORKFLOW_NOT_FOUND",
            StoreError::WorkflowAlreadyRunning => "WORKFLOW_ALREADY_RUNNING",
            StoreError::Io(_) => "STATE_IO",
            StoreError::Serde(_) => "STATE_SERDE",
        }
    }
}
