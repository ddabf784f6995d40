// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-context extraction from the request query string.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::{AppState, ProjectServices};

/// The `?project=<id>` query parameter, when present.
fn project_param(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("project=") {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Resolved project services; rejects with 422 when no context resolves.
pub struct Scoped(pub Arc<ProjectServices>);

#[async_trait]
impl FromRequestParts<AppState> for Scoped {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let project = project_param(parts);
        state.resolve(project.as_deref()).map(Scoped)
    }
}

/// Like [`Scoped`] but optional: config routes fall back to the global scope.
pub struct MaybeScoped(pub Option<Arc<ProjectServices>>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeScoped {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let project = project_param(parts);
        Ok(MaybeScoped(state.resolve(project.as_deref()).ok()))
    }
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
