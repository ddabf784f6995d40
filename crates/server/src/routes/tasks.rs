// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task CRUD and reordering.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::Json;
use qm_core::Task;
use qm_engine::{CreateTask, UpdateTask};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::extract::Scoped;

#[derive(Serialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    pub count: usize,
}

pub async fn list(
    Scoped(services): Scoped,
    Path(id): Path<String>,
) -> Result<Json<TaskList>, ApiError> {
    let tasks = services.tasks.list(&id)?;
    let count = tasks.len();
    Ok(Json(TaskList { tasks, count }))
}

pub async fn create(
    Scoped(services): Scoped,
    Path(id): Path<String>,
    Json(req): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if let Some(output_file) = &req.output_file {
        services.sandbox.resolve(output_file)?;
    }
    let task = services.tasks.create(&id, req)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn detail(
    Scoped(services): Scoped,
    Path((id, task_id)): Path<(String, String)>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(services.tasks.get(&id, &task_id)?))
}

pub async fn update(
    Scoped(services): Scoped,
    Path((id, task_id)): Path<(String, String)>,
    Json(patch): Json<UpdateTask>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(services.tasks.update(&id, &task_id, patch)?))
}

pub async fn delete(
    Scoped(services): Scoped,
    Path((id, task_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    services.tasks.delete(&id, &task_id)?;
    Ok(Json(json!({ "status": "deleted", "task_id": task_id })))
}

#[derive(Deserialize)]
pub struct ReorderRequest {
    pub order: Vec<String>,
}

pub async fn reorder(
    Scoped(services): Scoped,
    Path(id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    services.tasks.reorder(&id, req.order)?;
    Ok(Json(json!({ "status": "reordered" })))
}
