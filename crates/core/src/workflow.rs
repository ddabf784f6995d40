// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow identifier, record, and state machine.

use crate::clock::Clock;
use crate::task::Task;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a workflow.
    ///
    /// Generated ids are high-entropy (`wf-` + random suffix) so concurrent
    /// creates never collide; externally the id is an opaque string.
    pub struct WorkflowId("wf-", 19);
}

crate::wire_enum! {
    /// Lifecycle status of a workflow.
    pub enum WorkflowStatus {
        /// Created, never started
        Pending => "pending",
        /// A driver task owns it right now
        Running => "running",
        /// Suspended at a phase boundary, resumable
        Paused => "paused",
        /// Execution finished, task plan awaits human review
        AwaitingReview => "awaiting_review",
        /// Terminal success
        Completed => "completed",
        /// Terminal failure
        Failed => "failed",
    }
}

impl WorkflowStatus {
    /// Completed and Failed are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

crate::wire_enum! {
    /// Execution phase within a run.
    pub enum Phase {
        Analyze => "analyze",
        Plan => "plan",
        Execute => "execute",
        Done => "done",
    }
}

/// Metadata for a file attached to the workflow prompt.
///
/// The bytes live under `.quorum/attachments/workflows/<id>/<attachment_id>/`;
/// only the metadata travels with the workflow record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// A marker appended to the run history on notable transitions
/// (e.g. `force_stop`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub kind: String,
    pub at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Immutable-after-creation part of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Execution-mode hint consumed by the runner factory.
    #[serde(default)]
    pub blueprint: String,
    pub created_at_ms: u64,
}

/// Mutable part of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub status: WorkflowStatus,
    pub phase: Phase,
    #[serde(default)]
    pub tasks: HashMap<String, Task>,
    #[serde(default)]
    pub task_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at_ms: u64,
    /// Last liveness write by the owning process, epoch ms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checkpoints: Vec<Checkpoint>,
}

/// Inputs for creating a new workflow.
#[derive(Debug, Clone)]
pub struct WorkflowSeed {
    pub prompt: String,
    pub title: Option<String>,
    pub attachments: Vec<Attachment>,
    pub blueprint: String,
}

impl WorkflowSeed {
    pub fn builder(prompt: impl Into<String>) -> WorkflowSeedBuilder {
        WorkflowSeedBuilder {
            prompt: prompt.into(),
            title: None,
            attachments: Vec::new(),
            blueprint: "auto".to_string(),
        }
    }
}

pub struct WorkflowSeedBuilder {
    prompt: String,
    title: Option<String>,
    attachments: Vec<Attachment>,
    blueprint: String,
}

impl WorkflowSeedBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn blueprint(mut self, blueprint: impl Into<String>) -> Self {
        self.blueprint = blueprint.into();
        self
    }

    pub fn build(self) -> WorkflowSeed {
        WorkflowSeed {
            prompt: self.prompt,
            title: self.title,
            attachments: self.attachments,
            blueprint: self.blueprint,
        }
    }
}

/// A workflow instance: immutable definition plus mutable run state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub definition: WorkflowDefinition,
    pub run: WorkflowRun,
}

impl Workflow {
    /// Create a new pending workflow from seed inputs.
    pub fn new(seed: WorkflowSeed, clock: &impl Clock) -> Self {
        let now = clock.epoch_ms();
        Self {
            id: WorkflowId::generate(),
            definition: WorkflowDefinition {
                prompt: seed.prompt,
                title: seed.title,
                attachments: seed.attachments,
                blueprint: seed.blueprint,
                created_at_ms: now,
            },
            run: WorkflowRun {
                status: WorkflowStatus::Pending,
                phase: Phase::Analyze,
                tasks: HashMap::new(),
                task_order: Vec::new(),
                error: None,
                updated_at_ms: now,
                heartbeat_at_ms: None,
                checkpoints: Vec::new(),
            },
        }
    }

    pub fn status(&self) -> WorkflowStatus {
        self.run.status
    }

    pub fn is_terminal(&self) -> bool {
        self.run.status.is_terminal()
    }

    /// Whether a run/resume may be accepted in the current status.
    pub fn can_start(&self) -> bool {
        matches!(
            self.run.status,
            WorkflowStatus::Pending | WorkflowStatus::Failed | WorkflowStatus::Paused
        )
    }

    /// Structural task edits are permitted only while the task plan is under
    /// human control: status AwaitingReview or Completed, phase Execute or Done.
    pub fn can_mutate_tasks(&self) -> bool {
        matches!(
            self.run.status,
            WorkflowStatus::AwaitingReview | WorkflowStatus::Completed
        ) && matches!(self.run.phase, Phase::Execute | Phase::Done)
    }

    /// Transition to Failed with the given error message.
    pub fn set_failed(&mut self, error: impl Into<String>, now_ms: u64) {
        self.run.status = WorkflowStatus::Failed;
        self.run.error = Some(error.into());
        self.run.updated_at_ms = now_ms;
    }

    /// Append a checkpoint marker to the run history.
    pub fn push_checkpoint(&mut self, kind: &str, message: Option<String>, now_ms: u64) {
        self.run.checkpoints.push(Checkpoint {
            kind: kind.to_string(),
            at_ms: now_ms,
            message,
        });
    }

    /// Look up a task by id.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.run.tasks.get(task_id)
    }
}

/// Test builder for workflows in arbitrary states.
#[cfg(any(test, feature = "test-support"))]
pub struct WorkflowBuilder {
    id: WorkflowId,
    prompt: String,
    status: WorkflowStatus,
    phase: Phase,
    tasks: HashMap<String, Task>,
    task_order: Vec<String>,
    error: Option<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self {
            id: WorkflowId::new("wf-test"),
            prompt: "test prompt".to_string(),
            status: WorkflowStatus::Pending,
            phase: Phase::Analyze,
            tasks: HashMap::new(),
            task_order: Vec::new(),
            error: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl WorkflowBuilder {
    pub fn id(mut self, id: impl Into<WorkflowId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn status(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Add a task, keeping `task_order` in sync.
    pub fn task(mut self, task: Task) -> Self {
        let id = task.id.to_string();
        self.task_order.push(id.clone());
        self.tasks.insert(id, task);
        self
    }

    pub fn build(self) -> Workflow {
        Workflow {
            id: self.id,
            definition: WorkflowDefinition {
                prompt: self.prompt,
                title: None,
                attachments: Vec::new(),
                blueprint: "auto".to_string(),
                created_at_ms: 0,
            },
            run: WorkflowRun {
                status: self.status,
                phase: self.phase,
                tasks: self.tasks,
                task_order: self.task_order,
                error: self.error,
                updated_at_ms: 0,
                heartbeat_at_ms: None,
                checkpoints: Vec::new(),
            },
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Workflow {
    /// Create a builder with test defaults.
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
