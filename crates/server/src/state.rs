// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared server state: per-project scoped collaborators.
//!
//! Each registered project gets its own state store, event bus, tracker,
//! executor, task engine, and reaper. Handlers look the bundle up from the
//! request's project context. Optional collaborators (the runner factory)
//! are nullable slots checked at use.

use parking_lot::Mutex;
use qm_core::{PathSandbox, ProjectContext, SystemClock};
use qm_engine::{
    EventBus, ExecutorConfig, HeartbeatManager, OrphanReaper, RunnerFactory, TaskMutationEngine,
    TrackerConfig, UnifiedTracker, WorkflowExecutor,
};
use qm_storage::StateStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, ConfigStore, QuorumConfig};
use crate::error::ApiError;

/// Startup wiring for the server.
pub struct ServerConfig {
    /// `(project_id, project_root)` pairs to serve.
    pub projects: Vec<(String, PathBuf)>,
    /// Project assumed when the request names none.
    pub default_project: Option<String>,
    pub global_config: PathBuf,
    /// Builds runners per blueprint; absent means lifecycle starts answer 503.
    pub runner_factory: Option<Arc<dyn RunnerFactory>>,
}

/// Errors during server wiring.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("project setup io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] qm_storage::StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Scoped collaborators for one project.
pub struct ProjectServices {
    pub ctx: ProjectContext,
    pub config: QuorumConfig,
    pub store: Arc<StateStore>,
    pub bus: EventBus,
    pub tracker: Arc<UnifiedTracker<SystemClock>>,
    pub executor: WorkflowExecutor<SystemClock>,
    pub tasks: TaskMutationEngine<SystemClock>,
    pub reaper: Arc<OrphanReaper<SystemClock>>,
    pub sandbox: PathSandbox,
    /// Workflow currently surfaced as "active" in the UI.
    pub active: Mutex<Option<String>>,
}

impl ProjectServices {
    fn build(
        ctx: ProjectContext,
        config_store: &ConfigStore,
        runner_factory: Option<Arc<dyn RunnerFactory>>,
    ) -> Result<Arc<Self>, SetupError> {
        ctx.ensure_layout()?;
        let (config, _etag) = config_store.read(&config_store.effective_path(&ctx))?;

        let clock = SystemClock;
        let store = Arc::new(StateStore::open(ctx.state_path())?);
        let bus = EventBus::with_capacity(config.events.buffer_capacity);

        let heartbeat = HeartbeatManager::new(
            Arc::clone(&store),
            clock.clone(),
            Duration::from_secs(config.execution.heartbeat_interval_secs),
            config.execution.heartbeat_enabled,
        );
        let tracker = Arc::new(UnifiedTracker::new(
            Arc::clone(&store),
            heartbeat,
            clock.clone(),
            TrackerConfig {
                confirm_timeout: Duration::from_secs(config.execution.confirmation_timeout_secs),
                force_stop_grace: Duration::from_secs(config.execution.force_stop_grace_secs),
            },
        ));
        let executor = WorkflowExecutor::new(
            ctx.clone(),
            Arc::clone(&store),
            bus.clone(),
            Arc::clone(&tracker),
            runner_factory,
            clock.clone(),
            ExecutorConfig {
                execution_timeout: Duration::from_secs(config.execution.execution_timeout_secs),
            },
        );
        let tasks = TaskMutationEngine::new(
            Arc::clone(&store),
            bus.clone(),
            ctx.project_id.clone(),
            clock.clone(),
        );
        let reaper = Arc::new(OrphanReaper::new(
            Arc::clone(&store),
            Arc::clone(&tracker),
            clock,
        ));
        let sandbox = PathSandbox::new(&ctx.project_root);

        info!(project_id = %ctx.project_id, root = %ctx.project_root.display(), "project registered");
        Ok(Arc::new(Self {
            ctx,
            config,
            store,
            bus,
            tracker,
            executor,
            tasks,
            reaper,
            sandbox,
            active: Mutex::new(None),
        }))
    }
}

struct AppInner {
    config_store: ConfigStore,
    projects: HashMap<String, Arc<ProjectServices>>,
    default_project: Option<String>,
    started_at: Instant,
}

/// Cloneable handle threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, SetupError> {
        let config_store = ConfigStore::new(config.global_config);
        let mut projects = HashMap::new();
        for (id, root) in config.projects {
            let ctx = ProjectContext::new(id.clone(), root);
            let services =
                ProjectServices::build(ctx, &config_store, config.runner_factory.clone())?;
            projects.insert(id, services);
        }
        Ok(Self {
            inner: Arc::new(AppInner {
                config_store,
                projects,
                default_project: config.default_project,
                started_at: Instant::now(),
            }),
        })
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.inner.config_store
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    pub fn project_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.projects.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn projects(&self) -> impl Iterator<Item = &Arc<ProjectServices>> {
        self.inner.projects.values()
    }

    /// Resolve the scoped services for a request.
    ///
    /// Falls back to the configured default project, or to the single
    /// registered project when there is only one. Anything else requires an
    /// explicit `?project=` parameter.
    pub fn resolve(&self, project: Option<&str>) -> Result<Arc<ProjectServices>, ApiError> {
        let id = match project {
            Some(id) => id.to_string(),
            None => match &self.inner.default_project {
                Some(id) => id.clone(),
                None if self.inner.projects.len() == 1 => {
                    match self.inner.projects.keys().next() {
                        Some(id) => id.clone(),
                        None => return Err(ApiError::ProjectContextRequired),
                    }
                }
                None => return Err(ApiError::ProjectContextRequired),
            },
        };
        self.inner
            .projects
            .get(&id)
            .cloned()
            .ok_or(ApiError::ProjectContextRequired)
    }

    /// Graceful teardown: stop trackers and close buses.
    pub fn shutdown(&self) {
        for services in self.inner.projects.values() {
            services.tracker.shutdown();
            services.bus.close();
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
