// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle commands: run, cancel, pause, resume.
//!
//! Force-stop is not part of the HTTP surface; zombie recovery runs through
//! the tracker and the orphan reaper.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::Json;
use qm_core::WorkflowStatus;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::Scoped;

/// Start or resume, depending on the persisted status.
pub async fn run(
    Scoped(services): Scoped,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let wf = services.store.load_by_id(&id)?;
    if wf.run.status == WorkflowStatus::Paused {
        services.executor.resume(&id).await?;
    } else {
        services.executor.run(&id).await?;
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "workflow_id": id })),
    ))
}

pub async fn cancel(
    Scoped(services): Scoped,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // 404 for unknown ids, 409 for known-but-idle ones.
    services.store.load_by_id(&id)?;
    services.tracker.cancel(&id)?;
    Ok(Json(json!({ "status": "cancelling", "workflow_id": id })))
}

pub async fn pause(
    Scoped(services): Scoped,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    services.store.load_by_id(&id)?;
    services.tracker.pause(&id)?;
    Ok(Json(json!({ "status": "pausing", "workflow_id": id })))
}

/// Lift a pause on a live run, or restart a parked one.
pub async fn resume(
    Scoped(services): Scoped,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    services.store.load_by_id(&id)?;
    if services.tracker.has_handle(&id) {
        services.tracker.resume(&id)?;
    } else {
        services.executor.resume(&id).await?;
    }
    Ok(Json(json!({ "status": "resuming", "workflow_id": id })))
}
