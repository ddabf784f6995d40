// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records and dependency-graph validation.

use crate::id::IdBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

const HEX: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Unique identifier for a task within a workflow.
///
/// Format is `task_` + 16 random hex chars, matching the external shape
/// consumers already parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub IdBuf);

impl TaskId {
    pub const PREFIX: &'static str = "task_";

    /// Generate a new random task id.
    pub fn generate() -> Self {
        Self(IdBuf::new(&format!("{}{}", Self::PREFIX, nanoid::nanoid!(16, &HEX))))
    }

    /// Wrap an existing string (for parsing/deserialization).
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(IdBuf::new(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq<str> for TaskId {
    fn eq(&self, other: &str) -> bool {
        self.0.as_str() == other
    }
}

impl PartialEq<&str> for TaskId {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_str() == *other
    }
}

impl std::ops::Deref for TaskId {
    type Target = str;

    fn deref(&self) -> &str {
        self.0.as_str()
    }
}

crate::wire_enum! {
    /// Execution status of a task.
    pub enum TaskStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

/// A unit of execution inside a workflow, bound to a CLI and model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    /// Which CLI adapter drives this task (e.g. "claude").
    pub cli: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    /// Ids of tasks that must complete first. Always a DAG, never self-referencing.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default)]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(name: impl Into<String>, cli: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: TaskId::generate(),
            name: name.into(),
            cli: cli.into(),
            model: String::new(),
            description: None,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            tokens: 0,
            retries: 0,
            worktree_path: None,
            output_file: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            started_at_ms: None,
            finished_at_ms: None,
        }
    }
}

/// Test builder for tasks in arbitrary states.
#[cfg(any(test, feature = "test-support"))]
pub struct TaskBuilder {
    id: TaskId,
    name: String,
    cli: String,
    status: TaskStatus,
    dependencies: Vec<String>,
    output_file: Option<PathBuf>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for TaskBuilder {
    fn default() -> Self {
        Self {
            id: TaskId::new("task_0000000000000001"),
            name: "test-task".to_string(),
            cli: "claude".to_string(),
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            output_file: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl TaskBuilder {
    pub fn id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn cli(mut self, cli: impl Into<String>) -> Self {
        self.cli = cli.into();
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn output_file(mut self, output_file: impl Into<PathBuf>) -> Self {
        self.output_file = Some(output_file.into());
        self
    }

    pub fn build(self) -> Task {
        Task {
            id: self.id,
            name: self.name,
            cli: self.cli,
            model: String::new(),
            description: None,
            status: self.status,
            dependencies: self.dependencies,
            tokens: 0,
            retries: 0,
            worktree_path: None,
            output_file: self.output_file,
            created_at_ms: 0,
            updated_at_ms: 0,
            started_at_ms: None,
            finished_at_ms: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Task {
    /// Create a builder with test defaults.
    pub fn builder() -> TaskBuilder {
        TaskBuilder::default()
    }
}

/// Errors from dependency-graph validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DagError {
    #[error("circular dependency detected involving task {0}")]
    Cycle(String),

    #[error("task {0} depends on itself")]
    SelfDependency(String),

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Verify the task dependency relation is a DAG.
///
/// Three-color depth-first search: white = unvisited, gray = on the current
/// stack, black = finished. An edge into a gray node is a cycle. Self-edges
/// and edges to unknown tasks are reported separately.
pub fn validate_dag(tasks: &HashMap<String, Task>) -> Result<(), DagError> {
    for (id, task) in tasks {
        for dep in &task.dependencies {
            if dep == id {
                return Err(DagError::SelfDependency(id.clone()));
            }
            if !tasks.contains_key(dep) {
                return Err(DagError::UnknownDependency {
                    task: id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let mut colors: HashMap<&str, Color> =
        tasks.keys().map(|id| (id.as_str(), Color::White)).collect();

    fn visit<'a>(
        id: &'a str,
        tasks: &'a HashMap<String, Task>,
        colors: &mut HashMap<&'a str, Color>,
    ) -> Result<(), DagError> {
        colors.insert(id, Color::Gray);
        if let Some(task) = tasks.get(id) {
            for dep in &task.dependencies {
                match colors.get(dep.as_str()).copied().unwrap_or(Color::White) {
                    Color::Gray => return Err(DagError::Cycle(dep.clone())),
                    Color::White => visit(dep.as_str(), tasks, colors)?,
                    Color::Black => {}
                }
            }
        }
        colors.insert(id, Color::Black);
        Ok(())
    }

    let ids: Vec<&str> = tasks.keys().map(String::as_str).collect();
    for id in ids {
        if colors.get(id).copied().unwrap_or(Color::White) == Color::White {
            visit(id, tasks, &mut colors)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
