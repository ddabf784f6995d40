// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry row types for the running-workflows table.

use qm_core::WorkflowId;
use serde::{Deserialize, Serialize};

/// One row of the running-workflows registry.
///
/// Inserted when a tracker wins the start race, removed on finish, and reaped
/// when the lock holder can be proven dead on this host. The registry enforces
/// at-most-one running instance per workflow across processes sharing the
/// same store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningWorkflowRecord {
    pub workflow_id: WorkflowId,
    /// PID of the lock-holding process, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Hostname of the lock-holding process, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub acquired_at_ms: u64,
}

impl RunningWorkflowRecord {
    /// Record naming the current process as lock holder.
    pub fn local(workflow_id: impl Into<WorkflowId>, acquired_at_ms: u64) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            pid: Some(std::process::id()),
            host: Some(gethostname::gethostname().to_string_lossy().into_owned()),
            acquired_at_ms,
        }
    }

    /// Record with explicit holder metadata (tests, migration tooling).
    pub fn held_by(
        workflow_id: impl Into<WorkflowId>,
        pid: u32,
        host: impl Into<String>,
        acquired_at_ms: u64,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            pid: Some(pid),
            host: Some(host.into()),
            acquired_at_ms,
        }
    }
}
