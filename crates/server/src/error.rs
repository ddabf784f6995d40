// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API error taxonomy and its HTTP mapping.
//!
//! Validation failures surface verbatim; internal failures are logged with
//! workflow context and returned as a generic 500 without leaking internals.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use qm_core::SandboxError;
use qm_engine::{EngineError, TaskError};
use qm_storage::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::config::ConfigError;

/// Errors a handler can answer with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("project context is required")]
    ProjectContextRequired,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Config If-Match mismatch; carries the winning state for the client.
    #[error("config was modified by another writer")]
    PreconditionFailed {
        current_etag: String,
        config: serde_json::Value,
    },

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("internal error")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<serde_json::Value>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::ProjectContextRequired => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, current_etag, config) = match self {
            // Internal details go to the log, not the client.
            ApiError::Internal(detail) => {
                error!(error = %detail, "internal error");
                ("internal error".to_string(), None, None)
            }
            ApiError::PreconditionFailed { current_etag, config } => (
                "config was modified by another writer".to_string(),
                Some(current_etag),
                Some(config),
            ),
            other => (other.to_string(), None, None),
        };
        let code = match status {
            StatusCode::UNPROCESSABLE_ENTITY => Some("PROJECT_CONTEXT_REQUIRED"),
            _ => None,
        };
        (status, Json(ErrorBody { error: message, code, current_etag, config })).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::AlreadyRunning => ApiError::Conflict(err.to_string()),
            EngineError::NotFound(id) => ApiError::NotFound(format!("workflow not found: {id}")),
            EngineError::InvalidStatus { .. }
            | EngineError::NotRunning(_)
            | EngineError::AlreadyCancelled(_) => ApiError::Conflict(err.to_string()),
            EngineError::RunnerUnavailable | EngineError::UnknownBlueprint(_) => {
                ApiError::Unavailable(err.to_string())
            }
            EngineError::ConfirmationTimeout => ApiError::Timeout(err.to_string()),
            EngineError::StartFailed(msg) => ApiError::Internal(msg),
            EngineError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(format!("workflow not found: {id}")),
            StoreError::WorkflowAlreadyRunning => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::MutationGate | TaskError::HasDependents { .. } => {
                ApiError::Conflict(err.to_string())
            }
            TaskError::WorkflowNotFound(_) | TaskError::NotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            TaskError::EmptyName
            | TaskError::EmptyCli
            | TaskError::Dag(_)
            | TaskError::InvalidOrder => ApiError::Validation(err.to_string()),
            TaskError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<SandboxError> for ApiError {
    fn from(err: SandboxError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(msg) => ApiError::Validation(format!("invalid config: {msg}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
