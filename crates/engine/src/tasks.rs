// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DAG-safe task CRUD on workflows under human review.
//!
//! Every mutation runs inside one atomic store scope: the gate check, the
//! edit, and the graph validation commit or roll back together.

use qm_core::{validate_dag, Clock, DagError, EventKind, SystemClock, Task, Workflow};
use qm_storage::{StateStore, StoreError};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::bus::EventBus;

/// Errors from task mutations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The workflow is not in a state where its task plan may be edited.
    #[error("tasks can only be modified while the workflow awaits review or is completed")]
    MutationGate,

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task name cannot be empty")]
    EmptyName,

    #[error("task cli cannot be empty")]
    EmptyCli,

    #[error(transparent)]
    Dag(#[from] DagError),

    /// Deleting a task other tasks still depend on.
    #[error("task {task} is a dependency of {dependent}")]
    HasDependents { task: String, dependent: String },

    #[error("task order must be a permutation of the existing tasks")]
    InvalidOrder,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => TaskError::WorkflowNotFound(id),
            other => TaskError::Store(other),
        }
    }
}

/// Request payload for creating a task.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    pub name: String,
    pub cli: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub output_file: Option<String>,
}

/// Partial patch for an existing task. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTask {
    pub name: Option<String>,
    pub cli: Option<String>,
    pub description: Option<String>,
    pub dependencies: Option<Vec<String>>,
}

/// Structural task edits for one project's workflows.
pub struct TaskMutationEngine<C: Clock = SystemClock> {
    store: Arc<StateStore>,
    bus: EventBus,
    project_id: String,
    clock: C,
}

impl<C: Clock> TaskMutationEngine<C> {
    pub fn new(
        store: Arc<StateStore>,
        bus: EventBus,
        project_id: impl Into<String>,
        clock: C,
    ) -> Self {
        Self { store, bus, project_id: project_id.into(), clock }
    }

    /// Tasks of a workflow in display order.
    pub fn list(&self, workflow_id: &str) -> Result<Vec<Task>, TaskError> {
        let wf = self.store.load_by_id(workflow_id)?;
        Ok(tasks_in_order(&wf))
    }

    pub fn get(&self, workflow_id: &str, task_id: &str) -> Result<Task, TaskError> {
        let wf = self.store.load_by_id(workflow_id)?;
        wf.run
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    /// Append a new task; the resulting graph must stay acyclic.
    pub fn create(&self, workflow_id: &str, req: CreateTask) -> Result<Task, TaskError> {
        if req.name.trim().is_empty() {
            return Err(TaskError::EmptyName);
        }
        if req.cli.trim().is_empty() {
            return Err(TaskError::EmptyCli);
        }

        let now = self.clock.epoch_ms();
        let task = self.store.execute_atomically(|txn| -> Result<Task, TaskError> {
            let mut wf = txn.load_by_id(workflow_id)?;
            gate(&wf)?;

            for dep in &req.dependencies {
                if !wf.run.tasks.contains_key(dep) {
                    return Err(DagError::UnknownDependency {
                        task: req.name.clone(),
                        dependency: dep.clone(),
                    }
                    .into());
                }
            }

            let mut task = Task::new(req.name.clone(), req.cli.clone(), now);
            task.model = req.model.clone();
            task.description = req.description.clone();
            task.dependencies = req.dependencies.clone();
            task.output_file = req.output_file.clone().map(Into::into);

            let key = task.id.to_string();
            wf.run.tasks.insert(key.clone(), task.clone());
            wf.run.task_order.push(key);
            validate_dag(&wf.run.tasks)?;

            wf.run.updated_at_ms = now;
            txn.save(wf);
            Ok(task)
        })?;

        info!(workflow_id = %workflow_id, task_id = %task.id, "task created");
        self.bus.publish(qm_core::Event::new(
            workflow_id,
            self.project_id.as_str(),
            now,
            EventKind::TaskCreated { task_id: task.id.to_string(), name: task.name.clone() },
        ));
        Ok(task)
    }

    /// Patch name, CLI, description, or dependencies of a task.
    pub fn update(
        &self,
        workflow_id: &str,
        task_id: &str,
        patch: UpdateTask,
    ) -> Result<Task, TaskError> {
        if matches!(&patch.name, Some(name) if name.trim().is_empty()) {
            return Err(TaskError::EmptyName);
        }
        if matches!(&patch.cli, Some(cli) if cli.trim().is_empty()) {
            return Err(TaskError::EmptyCli);
        }
        if matches!(&patch.dependencies, Some(deps) if deps.iter().any(|d| d == task_id)) {
            return Err(TaskError::Dag(DagError::SelfDependency(task_id.to_string())));
        }

        let now = self.clock.epoch_ms();
        let task = self.store.execute_atomically(|txn| -> Result<Task, TaskError> {
            let mut wf = txn.load_by_id(workflow_id)?;
            gate(&wf)?;

            if !wf.run.tasks.contains_key(task_id) {
                return Err(TaskError::NotFound(task_id.to_string()));
            }
            if let Some(deps) = &patch.dependencies {
                for dep in deps {
                    if !wf.run.tasks.contains_key(dep) {
                        return Err(DagError::UnknownDependency {
                            task: task_id.to_string(),
                            dependency: dep.clone(),
                        }
                        .into());
                    }
                }
            }

            let deps_changed = patch.dependencies.is_some();
            let task = wf
                .run
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

            if let Some(name) = patch.name.clone() {
                task.name = name;
            }
            if let Some(cli) = patch.cli.clone() {
                task.cli = cli;
            }
            if let Some(description) = patch.description.clone() {
                task.description = Some(description);
            }
            if let Some(deps) = patch.dependencies.clone() {
                task.dependencies = deps;
            }
            task.updated_at_ms = now;
            let updated = task.clone();

            if deps_changed {
                validate_dag(&wf.run.tasks)?;
            }

            wf.run.updated_at_ms = now;
            txn.save(wf);
            Ok(updated)
        })?;

        info!(workflow_id = %workflow_id, task_id = %task_id, "task updated");
        Ok(task)
    }

    /// Remove a task nothing depends on.
    pub fn delete(&self, workflow_id: &str, task_id: &str) -> Result<(), TaskError> {
        let now = self.clock.epoch_ms();
        self.store.execute_atomically(|txn| -> Result<(), TaskError> {
            let mut wf = txn.load_by_id(workflow_id)?;
            gate(&wf)?;

            if !wf.run.tasks.contains_key(task_id) {
                return Err(TaskError::NotFound(task_id.to_string()));
            }
            if let Some(dependent) = wf
                .run
                .tasks
                .iter()
                .find(|(id, t)| {
                    id.as_str() != task_id && t.dependencies.iter().any(|d| d == task_id)
                })
                .map(|(id, _)| id.clone())
            {
                return Err(TaskError::HasDependents {
                    task: task_id.to_string(),
                    dependent,
                });
            }

            wf.run.tasks.remove(task_id);
            wf.run.task_order.retain(|id| id != task_id);
            wf.run.updated_at_ms = now;
            txn.save(wf);
            Ok(())
        })?;

        info!(workflow_id = %workflow_id, task_id = %task_id, "task deleted");
        Ok(())
    }

    /// Replace the display order; must be a permutation of the current set.
    pub fn reorder(&self, workflow_id: &str, order: Vec<String>) -> Result<(), TaskError> {
        let now = self.clock.epoch_ms();
        self.store.execute_atomically(|txn| -> Result<(), TaskError> {
            let mut wf = txn.load_by_id(workflow_id)?;
            gate(&wf)?;

            if order.len() != wf.run.tasks.len() {
                return Err(TaskError::InvalidOrder);
            }
            let unique: HashSet<&str> = order.iter().map(String::as_str).collect();
            if unique.len() != order.len()
                || !unique.iter().all(|id| wf.run.tasks.contains_key(*id))
            {
                return Err(TaskError::InvalidOrder);
            }

            wf.run.task_order = order.clone();
            wf.run.updated_at_ms = now;
            txn.save(wf);
            Ok(())
        })?;

        info!(workflow_id = %workflow_id, "tasks reordered");
        Ok(())
    }
}

fn tasks_in_order(wf: &Workflow) -> Vec<Task> {
    let mut out: Vec<Task> = wf
        .run
        .task_order
        .iter()
        .filter_map(|id| wf.run.tasks.get(id).cloned())
        .collect();
    // Tasks missing from the order list (legacy records) go last, by id.
    let mut stragglers: Vec<&Task> = wf
        .run
        .tasks
        .values()
        .filter(|t| !wf.run.task_order.iter().any(|id| id.as_str() == t.id.as_str()))
        .collect();
    stragglers.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
    out.extend(stragglers.into_iter().cloned());
    out
}

fn gate(wf: &Workflow) -> Result<(), TaskError> {
    if wf.can_mutate_tasks() {
        Ok(())
    } else {
        Err(TaskError::MutationGate)
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
