// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness and deep health probes.

use axum::extract::State;
use axum::Json;
use qm_core::{Clock, SystemClock};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct Liveness {
    status: &'static str,
}

pub async fn liveness() -> Json<Liveness> {
    Json(Liveness { status: "ok" })
}

#[derive(Serialize)]
pub struct DeepHealth {
    status: &'static str,
    uptime_secs: u64,
    projects: Vec<ProjectHealth>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
pub struct ProjectHealth {
    project_id: String,
    workflows: usize,
    running: usize,
    tracked: usize,
    subscribers: usize,
}

pub async fn deep(State(state): State<AppState>) -> Json<DeepHealth> {
    let mut projects = Vec::new();
    let mut warnings = Vec::new();

    for services in state.projects() {
        let running = services.store.list_running_workflows().len();
        let tracked = services.tracker.tracked_count();
        if !services.tracker.heartbeat().enabled() {
            warnings.push(format!(
                "heartbeats disabled for project {}; zombies need manual force-stop",
                services.ctx.project_id
            ));
        }
        if running > tracked {
            warnings.push(format!(
                "project {} has {} registry rows not tracked in this process",
                services.ctx.project_id,
                running - tracked
            ));
        }
        let heartbeat = services.tracker.heartbeat();
        if heartbeat.enabled() {
            let stale_ms = 2 * heartbeat.interval().as_millis() as u64;
            let zombies = services
                .store
                .find_zombie_workflows(stale_ms, SystemClock.epoch_ms());
            for zombie in zombies {
                warnings.push(format!(
                    "workflow {} has a stale heartbeat; force-stop may be required",
                    zombie.workflow_id
                ));
            }
        }
        projects.push(ProjectHealth {
            project_id: services.ctx.project_id.clone(),
            workflows: services.store.list_workflows().len(),
            running,
            tracked,
            subscribers: services.bus.subscriber_count(),
        });
    }
    projects.sort_by(|a, b| a.project_id.cmp(&b.project_id));

    Json(DeepHealth {
        status: "ok",
        uptime_secs: state.uptime().as_secs(),
        projects,
        warnings,
    })
}
