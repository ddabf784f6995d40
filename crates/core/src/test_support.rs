// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers and proptest strategies for tests across crates.

use crate::task::{Task, TaskStatus};
use crate::workflow::{Phase, WorkflowStatus};

/// Build a pending task with explicit id and dependencies.
pub fn task_with_deps(id: &str, deps: &[&str]) -> Task {
    Task::builder()
        .id(id)
        .name(id)
        .dependencies(deps.iter().map(|d| d.to_string()).collect())
        .build()
}

#[cfg(any(test, feature = "test-support"))]
pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    pub fn workflow_status() -> impl Strategy<Value = WorkflowStatus> {
        prop_oneof![
            Just(WorkflowStatus::Pending),
            Just(WorkflowStatus::Running),
            Just(WorkflowStatus::Paused),
            Just(WorkflowStatus::AwaitingReview),
            Just(WorkflowStatus::Completed),
            Just(WorkflowStatus::Failed),
        ]
    }

    pub fn phase() -> impl Strategy<Value = Phase> {
        prop_oneof![
            Just(Phase::Analyze),
            Just(Phase::Plan),
            Just(Phase::Execute),
            Just(Phase::Done),
        ]
    }

    pub fn task_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Running),
            Just(TaskStatus::Completed),
            Just(TaskStatus::Failed),
            Just(TaskStatus::Skipped),
        ]
    }

    /// Relative path segments that should always clear the sandbox.
    pub fn benign_path() -> impl Strategy<Value = String> {
        proptest::collection::vec("[a-z][a-z0-9_]{0,8}", 1..4).prop_map(|segs| segs.join("/"))
    }
}
