// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake runner implementations for tests across crates.

// Test-support code may panic on setup failure.
#![allow(clippy::panic)]

use async_trait::async_trait;
use parking_lot::Mutex;
use qm_core::SystemClock;
use qm_storage::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::executor::{ExecutorConfig, WorkflowExecutor};
use crate::heartbeat::HeartbeatManager;
use crate::runner::{RunOutcome, Runner, RunnerCtx, RunnerError, RunnerFactory};
use crate::tracker::{TrackerConfig, UnifiedTracker};
use crate::EngineError;
use qm_core::ProjectContext;

/// What a [`FakeRunner`] does when invoked.
#[derive(Clone)]
pub enum FakeBehavior {
    /// Return immediately with the given outcome.
    Immediate(RunOutcome),
    /// Fail immediately with the given message.
    Fail(String),
    /// Poll the control plane until cancelled or released.
    BlockUntilReleased,
    /// Sleep, then complete.
    CompleteAfter(Duration),
    /// Never confirm-friendly: sleep before even being scheduled out.
    Panic,
}

/// Scripted runner for exercising the executor and tracker.
pub struct FakeRunner {
    behavior: FakeBehavior,
    release: CancellationToken,
    pub invocations: Mutex<Vec<&'static str>>,
}

impl FakeRunner {
    pub fn new(behavior: FakeBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            release: CancellationToken::new(),
            invocations: Mutex::new(Vec::new()),
        })
    }

    /// Unblock a `BlockUntilReleased` runner.
    pub fn release(&self) {
        self.release.cancel();
    }

    async fn execute(&self, ctx: RunnerCtx) -> Result<RunOutcome, RunnerError> {
        match &self.behavior {
            FakeBehavior::Immediate(outcome) => Ok(*outcome),
            FakeBehavior::Fail(msg) => Err(RunnerError::Failed(msg.clone())),
            FakeBehavior::BlockUntilReleased => loop {
                if ctx.control.cancel_requested() {
                    return Err(RunnerError::Cancelled);
                }
                if ctx.control.pause_requested() {
                    return Ok(RunOutcome::Paused);
                }
                if self.release.is_cancelled() {
                    return Ok(RunOutcome::Completed);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            },
            FakeBehavior::CompleteAfter(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(RunOutcome::Completed)
            }
            FakeBehavior::Panic => panic!("fake runner panic"),
        }
    }
}

#[async_trait]
impl Runner for FakeRunner {
    async fn run_with_state(&self, ctx: RunnerCtx) -> Result<RunOutcome, RunnerError> {
        self.invocations.lock().push("run");
        self.execute(ctx).await
    }

    async fn resume_with_state(&self, ctx: RunnerCtx) -> Result<RunOutcome, RunnerError> {
        self.invocations.lock().push("resume");
        self.execute(ctx).await
    }
}

/// Factory handing out one shared [`FakeRunner`] regardless of blueprint.
pub struct FakeRunnerFactory {
    pub runner: Arc<FakeRunner>,
}

impl FakeRunnerFactory {
    pub fn new(runner: Arc<FakeRunner>) -> Arc<Self> {
        Arc::new(Self { runner })
    }

    pub fn immediate(outcome: RunOutcome) -> Arc<Self> {
        Self::new(FakeRunner::new(FakeBehavior::Immediate(outcome)))
    }
}

impl RunnerFactory for FakeRunnerFactory {
    fn build(&self, _blueprint: &str) -> Result<Arc<dyn Runner>, EngineError> {
        let runner: Arc<dyn Runner> = self.runner.clone();
        Ok(runner)
    }
}

/// Everything needed to exercise the engine against a temp store.
pub struct EngineHarness {
    pub dir: tempfile::TempDir,
    pub project: ProjectContext,
    pub store: Arc<StateStore>,
    pub bus: EventBus,
    pub tracker: Arc<UnifiedTracker<SystemClock>>,
}

impl EngineHarness {
    pub fn new() -> Self {
        Self::with_heartbeat(false, Duration::from_secs(30))
    }

    pub fn with_heartbeat(enabled: bool, interval: Duration) -> Self {
        let dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => panic!("tempdir: {e}"),
        };
        let project = ProjectContext::new("test-project", dir.path());
        let store = match StateStore::open(project.state_path()) {
            Ok(store) => Arc::new(store),
            Err(e) => panic!("store open: {e}"),
        };
        let clock = SystemClock;
        let heartbeat = HeartbeatManager::new(Arc::clone(&store), clock.clone(), interval, enabled);
        let tracker = Arc::new(UnifiedTracker::new(
            Arc::clone(&store),
            heartbeat,
            clock,
            TrackerConfig::default(),
        ));
        Self { dir, project, store, bus: EventBus::new(), tracker }
    }

    /// Executor wired to this harness with the given factory.
    pub fn executor(&self, factory: Option<Arc<dyn RunnerFactory>>) -> WorkflowExecutor<SystemClock> {
        WorkflowExecutor::new(
            self.project.clone(),
            Arc::clone(&self.store),
            self.bus.clone(),
            Arc::clone(&self.tracker),
            factory,
            SystemClock,
            ExecutorConfig::default(),
        )
    }
}

impl Default for EngineHarness {
    fn default() -> Self {
        Self::new()
    }
}
