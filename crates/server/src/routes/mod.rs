// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router assembly for the HTTP surface.

mod config;
mod events;
mod health;
mod lifecycle;
mod tasks;
mod workflows;

use axum::error_handling::HandleErrorLayer;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::Router;
use std::time::Duration;
use tower::ServiceBuilder;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    router_with_timeout(state, crate::env::http_timeout())
}

/// Router with an explicit request budget (test hook).
pub fn router_with_timeout(state: AppState, timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/deep", get(health::deep))
        .route("/api/v1/workflows/", get(workflows::list).post(workflows::create))
        .route("/api/v1/workflows/active", get(workflows::active))
        .route(
            "/api/v1/workflows/:id/",
            get(workflows::detail)
                .patch(workflows::update)
                .put(workflows::update)
                .delete(workflows::delete),
        )
        .route("/api/v1/workflows/:id/activate", post(workflows::activate))
        .route("/api/v1/workflows/:id/run", post(lifecycle::run))
        .route("/api/v1/workflows/:id/cancel", post(lifecycle::cancel))
        .route("/api/v1/workflows/:id/pause", post(lifecycle::pause))
        .route("/api/v1/workflows/:id/resume", post(lifecycle::resume))
        .route("/api/v1/workflows/:id/tasks", get(tasks::list).post(tasks::create))
        .route("/api/v1/workflows/:id/tasks/reorder", put(tasks::reorder))
        .route(
            "/api/v1/workflows/:id/tasks/:task_id",
            get(tasks::detail)
                .patch(tasks::update)
                .put(tasks::update)
                .delete(tasks::delete),
        )
        .route("/api/v1/events", get(events::stream))
        .route("/api/v1/sse/events", get(events::stream))
        .route("/api/v1/config", get(config::get_effective).patch(config::patch_effective))
        .route("/api/v1/config/global", get(config::get_global).patch(config::patch_global))
        .route("/api/v1/config/reset", post(config::reset))
        .route("/api/v1/config/validate", post(config::validate))
        .route("/api/v1/config/schema", get(config::schema))
        .route("/api/v1/config/enums", get(config::enums))
        .route("/api/v1/config/agents", get(config::agents))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(tower::timeout::TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}

async fn handle_middleware_error(err: tower::BoxError) -> axum::response::Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        ApiError::Timeout("request exceeded its time budget".to_string()).into_response()
    } else {
        ApiError::Internal(err.to_string()).into_response()
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
