// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow CRUD and the active-workflow pointer.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::Json;
use qm_core::{
    Attachment, Checkpoint, SystemClock, Task, Workflow, WorkflowSeed, WorkflowStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::error::ApiError;
use crate::extract::Scoped;
use crate::state::ProjectServices;

#[derive(Serialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub title: Option<String>,
    pub prompt: String,
    pub status: String,
    pub phase: String,
    pub blueprint: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub task_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct WorkflowDetail {
    #[serde(flatten)]
    pub summary: WorkflowSummary,
    pub tasks: Vec<Task>,
    pub attachments: Vec<Attachment>,
    pub checkpoints: Vec<Checkpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_at: Option<u64>,
}

fn summary(wf: &Workflow) -> WorkflowSummary {
    WorkflowSummary {
        id: wf.id.to_string(),
        title: wf.definition.title.clone(),
        prompt: wf.definition.prompt.clone(),
        status: wf.run.status.to_string(),
        phase: wf.run.phase.to_string(),
        blueprint: wf.definition.blueprint.clone(),
        created_at: wf.definition.created_at_ms,
        updated_at: wf.run.updated_at_ms,
        task_count: wf.run.tasks.len(),
        error: wf.run.error.clone(),
    }
}

fn to_detail(services: &ProjectServices, wf: &Workflow) -> WorkflowDetail {
    let tasks = services.tasks.list(wf.id.as_str()).unwrap_or_default();
    WorkflowDetail {
        summary: summary(wf),
        tasks,
        attachments: wf.definition.attachments.clone(),
        checkpoints: wf.run.checkpoints.clone(),
        heartbeat_at: wf.run.heartbeat_at_ms,
    }
}

#[derive(Serialize)]
pub struct WorkflowList {
    pub workflows: Vec<WorkflowSummary>,
    pub count: usize,
}

pub async fn list(Scoped(services): Scoped) -> Json<WorkflowList> {
    let workflows: Vec<WorkflowSummary> =
        services.store.list_workflows().iter().map(summary).collect();
    let count = workflows.len();
    Json(WorkflowList { workflows, count })
}

#[derive(Deserialize)]
pub struct AttachmentRequest {
    pub name: String,
    /// Project-relative source path, validated through the sandbox.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateWorkflow {
    pub prompt: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub blueprint: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRequest>,
}

pub async fn create(
    Scoped(services): Scoped,
    Json(req): Json<CreateWorkflow>,
) -> Result<(StatusCode, Json<WorkflowDetail>), ApiError> {
    if req.prompt.trim().is_empty() {
        return Err(ApiError::Validation("prompt cannot be empty".to_string()));
    }

    let mut attachments = Vec::new();
    for (index, att) in req.attachments.iter().enumerate() {
        if att.name.trim().is_empty() {
            return Err(ApiError::Validation("attachment name cannot be empty".to_string()));
        }
        if let Some(path) = &att.path {
            services.sandbox.resolve(path)?;
        }
        attachments.push(Attachment {
            id: format!("att_{index}"),
            name: att.name.clone(),
            media_type: att.media_type.clone(),
        });
    }

    let mut builder = WorkflowSeed::builder(req.prompt).attachments(attachments);
    if let Some(title) = req.title {
        builder = builder.title(title);
    }
    if let Some(blueprint) = req.blueprint {
        builder = builder.blueprint(blueprint);
    }
    let wf = Workflow::new(builder.build(), &SystemClock);
    services.store.save(wf.clone())?;

    Ok((StatusCode::CREATED, Json(to_detail(&services, &wf))))
}

fn detail_of(services: &Arc<ProjectServices>, id: &str) -> Result<WorkflowDetail, ApiError> {
    let wf = services.store.load_by_id(id)?;
    Ok(to_detail(services, &wf))
}

pub async fn detail(
    Scoped(services): Scoped,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDetail>, ApiError> {
    Ok(Json(detail_of(&services, &id)?))
}

#[derive(Deserialize)]
pub struct UpdateWorkflow {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub blueprint: Option<String>,
}

/// Config edits are only allowed while the workflow has never run.
pub async fn update(
    Scoped(services): Scoped,
    Path(id): Path<String>,
    Json(req): Json<UpdateWorkflow>,
) -> Result<Json<WorkflowDetail>, ApiError> {
    if matches!(&req.prompt, Some(p) if p.trim().is_empty()) {
        return Err(ApiError::Validation("prompt cannot be empty".to_string()));
    }

    let wf = services.store.execute_atomically(|txn| -> Result<Workflow, ApiError> {
        let mut wf = txn.load_by_id(&id).map_err(ApiError::from)?;
        if wf.run.status != WorkflowStatus::Pending {
            return Err(ApiError::Conflict(format!(
                "workflow {id} can only be edited while pending (status: {})",
                wf.run.status
            )));
        }
        if let Some(title) = req.title.clone() {
            wf.definition.title = Some(title);
        }
        if let Some(prompt) = req.prompt.clone() {
            wf.definition.prompt = prompt;
        }
        if let Some(blueprint) = req.blueprint.clone() {
            wf.definition.blueprint = blueprint;
        }
        txn.save(wf.clone());
        Ok(wf)
    })?;

    Ok(Json(to_detail(&services, &wf)))
}

pub async fn delete(
    Scoped(services): Scoped,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if services.tracker.is_running(&id) {
        return Err(ApiError::Conflict(format!(
            "workflow {id} cannot be deleted while running"
        )));
    }
    services.store.delete_workflow(&id)?;
    let mut active = services.active.lock();
    if active.as_deref() == Some(id.as_str()) {
        *active = None;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate(
    Scoped(services): Scoped,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // Must exist before it can be activated.
    services.store.load_by_id(&id)?;
    *services.active.lock() = Some(id.clone());
    Ok(Json(json!({ "active": id })))
}

pub async fn active(Scoped(services): Scoped) -> Result<Json<WorkflowDetail>, ApiError> {
    let id = services
        .active
        .lock()
        .clone()
        .ok_or_else(|| ApiError::NotFound("no active workflow".to_string()))?;
    Ok(Json(detail_of(&services, &id)?))
}
