// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events fanned out to live subscribers.
//!
//! Serializes as a flat JSON object: envelope fields plus the payload of the
//! tagged [`EventKind`], e.g.
//! `{"workflow_id":"wf-1","project_id":"p","timestamp":1,"type":"workflow_started","prompt":"..."}`.

use crate::workflow::{Phase, WorkflowId, WorkflowStatus};
use serde::{Deserialize, Serialize};

/// An event with its envelope. Every event carries the workflow it concerns,
/// the project scope, and an epoch-milliseconds timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub workflow_id: WorkflowId,
    pub project_id: String,
    /// Epoch milliseconds.
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(
        workflow_id: impl Into<WorkflowId>,
        project_id: impl Into<String>,
        timestamp: u64,
        kind: EventKind,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            project_id: project_id.into(),
            timestamp,
            kind,
        }
    }

    /// Event type tag, used as the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Closed set of event payloads.
///
/// One exhaustive match site ([`EventKind::name`]) produces the wire tag;
/// the serde tag produces the JSON `type` field with the same value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // -- workflow lifecycle --
    WorkflowStarted {
        prompt: String,
    },
    WorkflowStateUpdated {
        status: WorkflowStatus,
        phase: Phase,
    },
    WorkflowPaused,
    WorkflowResumed,
    WorkflowCompleted {
        duration_ms: u64,
    },
    WorkflowFailed {
        error: String,
        duration_ms: u64,
    },

    // -- task lifecycle --
    TaskCreated {
        task_id: String,
        name: String,
    },
    TaskStarted {
        task_id: String,
    },
    TaskProgress {
        task_id: String,
        message: String,
    },
    TaskCompleted {
        task_id: String,
        tokens: u64,
    },
    TaskFailed {
        task_id: String,
        error: String,
    },
    TaskSkipped {
        task_id: String,
        reason: String,
    },
    TaskRetry {
        task_id: String,
        attempt: u32,
    },

    // -- streaming / phases --
    AgentStream {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
        chunk: String,
    },
    PhaseStarted {
        phase: Phase,
    },
    PhaseCompleted {
        phase: Phase,
    },
    Log {
        level: String,
        message: String,
    },

    // -- issue publication progress --
    IssuesGenerationProgress {
        completed: u32,
        total: u32,
    },
    IssuesPublishingProgress {
        completed: u32,
        total: u32,
    },

    // -- kanban engine --
    KanbanWorkflowMoved {
        from_column: String,
        to_column: String,
    },
    KanbanExecutionStarted {
        column: String,
    },
    KanbanExecutionCompleted {
        column: String,
    },
    KanbanExecutionFailed {
        column: String,
        error: String,
    },
    KanbanEngineStateChanged {
        engine_state: String,
    },
    KanbanCircuitBreakerOpened {
        reason: String,
    },
}

impl EventKind {
    /// Wire tag for this event type. Matches the serde `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::WorkflowStarted { .. } => "workflow_started",
            EventKind::WorkflowStateUpdated { .. } => "workflow_state_updated",
            EventKind::WorkflowPaused => "workflow_paused",
            EventKind::WorkflowResumed => "workflow_resumed",
            EventKind::WorkflowCompleted { .. } => "workflow_completed",
            EventKind::WorkflowFailed { .. } => "workflow_failed",
            EventKind::TaskCreated { .. } => "task_created",
            EventKind::TaskStarted { .. } => "task_started",
            EventKind::TaskProgress { .. } => "task_progress",
            EventKind::TaskCompleted { .. } => "task_completed",
            EventKind::TaskFailed { .. } => "task_failed",
            EventKind::TaskSkipped { .. } => "task_skipped",
            EventKind::TaskRetry { .. } => "task_retry",
            EventKind::AgentStream { .. } => "agent_stream",
            EventKind::PhaseStarted { .. } => "phase_started",
            EventKind::PhaseCompleted { .. } => "phase_completed",
            EventKind::Log { .. } => "log",
            EventKind::IssuesGenerationProgress { .. } => "issues_generation_progress",
            EventKind::IssuesPublishingProgress { .. } => "issues_publishing_progress",
            EventKind::KanbanWorkflowMoved { .. } => "kanban_workflow_moved",
            EventKind::KanbanExecutionStarted { .. } => "kanban_execution_started",
            EventKind::KanbanExecutionCompleted { .. } => "kanban_execution_completed",
            EventKind::KanbanExecutionFailed { .. } => "kanban_execution_failed",
            EventKind::KanbanEngineStateChanged { .. } => "kanban_engine_state_changed",
            EventKind::KanbanCircuitBreakerOpened { .. } => "kanban_circuit_breaker_opened",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
