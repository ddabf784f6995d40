// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration surface: conditional reads and writes, reset, validation,
//! schema and enum emission, agent listing.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use qm_core::{ConfigMode, Phase, WorkflowStatus};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;

use crate::config::{ConfigPatch, ConfigUpdate, QuorumConfig, KNOWN_CLIS, LOG_LEVELS};
use crate::error::ApiError;
use crate::extract::MaybeScoped;
use crate::state::AppState;

fn effective_path(state: &AppState, scoped: &MaybeScoped) -> PathBuf {
    match &scoped.0 {
        Some(services) => state.config_store().effective_path(&services.ctx),
        None => state.config_store().global_path().to_path_buf(),
    }
}

fn config_response(config: &QuorumConfig, etag: &str) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = format!("\"{etag}\"").parse() {
        headers.insert(header::ETAG, value);
    }
    (
        headers,
        Json(json!({ "config": config, "etag": etag })),
    )
        .into_response()
}

fn if_none_match_hits(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"') == etag)
        .unwrap_or(false)
}

fn if_match_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

#[derive(Deserialize, Default)]
pub struct WriteParams {
    #[serde(default)]
    pub force: bool,
}

async fn get_at(state: &AppState, path: PathBuf, headers: HeaderMap) -> Result<Response, ApiError> {
    let (config, etag) = state.config_store().read(&path)?;
    if if_none_match_hits(&headers, &etag) {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }
    Ok(config_response(&config, &etag))
}

async fn patch_at(
    state: &AppState,
    path: PathBuf,
    headers: HeaderMap,
    force: bool,
    patch: ConfigPatch,
) -> Result<Response, ApiError> {
    let if_match = if_match_of(&headers);
    match state
        .config_store()
        .update(&path, &patch, if_match.as_deref(), force)?
    {
        ConfigUpdate::Applied { config, etag } => Ok(config_response(&config, &etag)),
        ConfigUpdate::Conflict { config, etag } => Err(ApiError::PreconditionFailed {
            current_etag: etag,
            config: serde_json::to_value(&config).unwrap_or_default(),
        }),
    }
}

pub async fn get_effective(
    State(state): State<AppState>,
    scoped: MaybeScoped,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let path = effective_path(&state, &scoped);
    get_at(&state, path, headers).await
}

pub async fn patch_effective(
    State(state): State<AppState>,
    scoped: MaybeScoped,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    Json(patch): Json<ConfigPatch>,
) -> Result<Response, ApiError> {
    let path = effective_path(&state, &scoped);
    patch_at(&state, path, headers, params.force, patch).await
}

pub async fn get_global(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let path = state.config_store().global_path().to_path_buf();
    get_at(&state, path, headers).await
}

pub async fn patch_global(
    State(state): State<AppState>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    Json(patch): Json<ConfigPatch>,
) -> Result<Response, ApiError> {
    let path = state.config_store().global_path().to_path_buf();
    patch_at(&state, path, headers, params.force, patch).await
}

pub async fn reset(
    State(state): State<AppState>,
    scoped: MaybeScoped,
) -> Result<Response, ApiError> {
    let path = effective_path(&state, &scoped);
    let (config, etag) = state.config_store().reset(&path)?;
    Ok(config_response(&config, &etag))
}

pub async fn validate(Json(candidate): Json<QuorumConfig>) -> Result<Json<serde_json::Value>, ApiError> {
    match candidate.validate() {
        Ok(()) => Ok(Json(json!({ "valid": true }))),
        Err(e) => Err(ApiError::Validation(e.to_string())),
    }
}

pub async fn schema() -> Json<serde_json::Value> {
    Json(json!({
        "sections": {
            "general": {
                "default_cli": { "type": "string", "enum": KNOWN_CLIS, "default": "claude" },
                "default_model": { "type": "string", "default": "" },
                "log_level": { "type": "string", "enum": LOG_LEVELS, "default": "info" },
            },
            "execution": {
                "execution_timeout_secs": { "type": "integer", "minimum": 1, "default": 14400 },
                "confirmation_timeout_secs": { "type": "integer", "minimum": 1, "default": 5 },
                "force_stop_grace_secs": { "type": "integer", "minimum": 0, "default": 2 },
                "heartbeat_interval_secs": { "type": "integer", "minimum": 1, "default": 30 },
                "heartbeat_enabled": { "type": "boolean", "default": true },
                "max_parallel_tasks": { "type": "integer", "minimum": 1, "maximum": 64, "default": 4 },
            },
            "events": {
                "buffer_capacity": { "type": "integer", "minimum": 1, "default": 100 },
            },
            "agents": {
                "enabled_clis": { "type": "array", "items": { "enum": KNOWN_CLIS } },
                "model_overrides": { "type": "object" },
            },
        }
    }))
}

pub async fn enums() -> Json<serde_json::Value> {
    let workflow_statuses: Vec<&str> = WorkflowStatus::ALL.iter().map(|s| s.as_str()).collect();
    let phases: Vec<&str> = Phase::ALL.iter().map(|p| p.as_str()).collect();
    let config_modes: Vec<&str> = ConfigMode::ALL.iter().map(|m| m.as_str()).collect();
    Json(json!({
        "clis": KNOWN_CLIS,
        "log_levels": LOG_LEVELS,
        "blueprints": ["auto", "plan_first", "execute_only"],
        "workflow_statuses": workflow_statuses,
        "phases": phases,
        "config_modes": config_modes,
    }))
}

pub async fn agents(
    State(state): State<AppState>,
    scoped: MaybeScoped,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = effective_path(&state, &scoped);
    let (config, _etag) = state.config_store().read(&path)?;
    let agents: Vec<serde_json::Value> = config
        .agents
        .enabled_clis
        .iter()
        .map(|cli| {
            let model = config
                .agents
                .model_overrides
                .get(cli)
                .cloned()
                .unwrap_or_else(|| config.general.default_model.clone());
            json!({ "cli": cli, "model": model })
        })
        .collect();
    Ok(Json(json!({ "agents": agents })))
}
