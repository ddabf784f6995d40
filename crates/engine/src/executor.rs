// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run/Resume orchestration.
//!
//! The executor validates state, claims the tracker slot, launches the async
//! driver, and turns its start confirmation into a synchronous answer for the
//! HTTP layer. The driver owns the run from there: it survives the request,
//! honors the execution timeout and exec-cancel token, and always reports a
//! terminal status back through an atomic store scope.

use futures_util::FutureExt;
use qm_core::{Clock, EventKind, Phase, ProjectContext, SystemClock, Workflow, WorkflowStatus};
use qm_storage::{StateStore, StoreError};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bus::EventBus;
use crate::handle::ExecutionHandle;
use crate::runner::{RunOutcome, Runner, RunnerCtx, RunnerError, RunnerFactory};
use crate::tracker::UnifiedTracker;
use crate::EngineError;

/// Tunables for execution timing.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Wall-clock budget for one run.
    pub execution_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { execution_timeout: Duration::from_secs(4 * 60 * 60) }
    }
}

/// Whether the driver enters via `run_with_state` or `resume_with_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Run,
    Resume,
}

/// Orchestrates workflow starts for one project.
pub struct WorkflowExecutor<C: Clock = SystemClock> {
    project: ProjectContext,
    store: Arc<StateStore>,
    bus: EventBus,
    tracker: Arc<UnifiedTracker<C>>,
    runner_factory: Option<Arc<dyn RunnerFactory>>,
    clock: C,
    config: ExecutorConfig,
}

impl<C: Clock> WorkflowExecutor<C> {
    pub fn new(
        project: ProjectContext,
        store: Arc<StateStore>,
        bus: EventBus,
        tracker: Arc<UnifiedTracker<C>>,
        runner_factory: Option<Arc<dyn RunnerFactory>>,
        clock: C,
        config: ExecutorConfig,
    ) -> Self {
        Self { project, store, bus, tracker, runner_factory, clock, config }
    }

    pub async fn run(&self, id: &str) -> Result<(), EngineError> {
        self.start(id, StartMode::Run).await
    }

    pub async fn resume(&self, id: &str) -> Result<(), EngineError> {
        self.start(id, StartMode::Resume).await
    }

    async fn start(&self, id: &str, mode: StartMode) -> Result<(), EngineError> {
        let wf = self.store.load_by_id(id)?;
        match wf.run.status {
            WorkflowStatus::Running => return Err(EngineError::AlreadyRunning),
            status if !wf.can_start() => {
                return Err(EngineError::InvalidStatus {
                    id: id.to_string(),
                    operation: "start",
                    status: status.to_string(),
                })
            }
            _ => {}
        }

        let factory = self
            .runner_factory
            .clone()
            .ok_or(EngineError::RunnerUnavailable)?;

        let handle = self.tracker.start_execution(id)?;

        let runner = match factory.build(&wf.definition.blueprint) {
            Ok(runner) => runner,
            Err(e) => {
                self.tracker
                    .rollback_execution(id, &format!("runner construction failed: {e}"));
                return Err(e);
            }
        };

        // Reload to observe the Running transition committed by the tracker.
        let workflow = self.store.load_by_id(id)?;

        let exec_cancel = CancellationToken::new();
        handle.set_exec_cancel(exec_cancel.clone());

        tokio::spawn(drive(DriverCtx {
            project: self.project.clone(),
            store: Arc::clone(&self.store),
            bus: self.bus.clone(),
            tracker: Arc::clone(&self.tracker),
            handle: handle.clone(),
            runner,
            workflow,
            clock: self.clock.clone(),
            execution_timeout: self.config.execution_timeout,
            exec_cancel,
            mode,
        }));

        // Wait on the handle held from start_execution rather than looking it
        // up again: a fast driver may have already finished and removed it.
        match handle.wait_confirmed(self.tracker.config().confirm_timeout).await {
            Ok(()) => {
                info!(workflow_id = %id, ?mode, "execution started");
                Ok(())
            }
            Err(e) => {
                self.tracker
                    .rollback_execution(id, "driver failed to confirm start");
                Err(e)
            }
        }
    }
}

struct DriverCtx<C: Clock> {
    project: ProjectContext,
    store: Arc<StateStore>,
    bus: EventBus,
    tracker: Arc<UnifiedTracker<C>>,
    handle: ExecutionHandle,
    runner: Arc<dyn Runner>,
    workflow: Workflow,
    clock: C,
    execution_timeout: Duration,
    exec_cancel: CancellationToken,
    mode: StartMode,
}

/// What a run resolved to, after timeout/cancel/panic handling.
enum DriverVerdict {
    Outcome(RunOutcome),
    Failed(String),
}

async fn drive<C: Clock>(ctx: DriverCtx<C>) {
    let id = ctx.workflow.id.to_string();
    let project_id = ctx.project.project_id.clone();

    ctx.handle.confirm_started();
    ctx.bus.publish(qm_core::Event::new(
        id.as_str(),
        project_id.as_str(),
        ctx.clock.epoch_ms(),
        EventKind::WorkflowStarted { prompt: ctx.workflow.definition.prompt.clone() },
    ));

    let started = ctx.clock.now();
    let runner_ctx = RunnerCtx {
        project: ctx.project.clone(),
        workflow: ctx.workflow.clone(),
        store: Arc::clone(&ctx.store),
        bus: ctx.bus.clone(),
        control: ctx.handle.control().clone(),
    };

    let runner = Arc::clone(&ctx.runner);
    let mode = ctx.mode;
    let run_fut = async move {
        match mode {
            StartMode::Run => runner.run_with_state(runner_ctx).await,
            StartMode::Resume => runner.resume_with_state(runner_ctx).await,
        }
    };

    let verdict = tokio::select! {
        result = tokio::time::timeout(ctx.execution_timeout, AssertUnwindSafe(run_fut).catch_unwind()) => {
            match result {
                Err(_) => DriverVerdict::Failed(format!(
                    "execution exceeded {}s budget",
                    ctx.execution_timeout.as_secs()
                )),
                Ok(Err(_panic)) => DriverVerdict::Failed("runner panicked".to_string()),
                Ok(Ok(Ok(outcome))) => DriverVerdict::Outcome(outcome),
                Ok(Ok(Err(RunnerError::Cancelled))) => {
                    DriverVerdict::Failed("workflow cancelled".to_string())
                }
                Ok(Ok(Err(e))) => DriverVerdict::Failed(e.to_string()),
            }
        }
        _ = ctx.exec_cancel.cancelled() => DriverVerdict::Failed("workflow cancelled".to_string()),
    };

    let duration_ms = ctx.clock.now().duration_since(started).as_millis() as u64;
    finish(&ctx, &id, &project_id, verdict, duration_ms);

    ctx.tracker.finish_execution(&id);
    ctx.handle.mark_driver_finished();
}

/// Persist the terminal transition and publish the matching lifecycle event.
///
/// Runs even when the runner panicked or timed out; transition failures are
/// logged, never propagated out of the driver.
fn finish<C: Clock>(
    ctx: &DriverCtx<C>,
    id: &str,
    project_id: &str,
    verdict: DriverVerdict,
    duration_ms: u64,
) {
    let now = ctx.clock.epoch_ms();

    let (event_kind, transition): (EventKind, Box<dyn FnOnce(&mut Workflow) + Send>) =
        match verdict {
            DriverVerdict::Outcome(RunOutcome::Completed) => (
                EventKind::WorkflowCompleted { duration_ms },
                Box::new(move |wf| {
                    wf.run.status = WorkflowStatus::Completed;
                    wf.run.phase = Phase::Done;
                    wf.run.updated_at_ms = now;
                }),
            ),
            DriverVerdict::Outcome(RunOutcome::AwaitingReview) => (
                EventKind::WorkflowStateUpdated {
                    status: WorkflowStatus::AwaitingReview,
                    phase: Phase::Execute,
                },
                Box::new(move |wf| {
                    wf.run.status = WorkflowStatus::AwaitingReview;
                    wf.run.phase = Phase::Execute;
                    wf.run.updated_at_ms = now;
                }),
            ),
            DriverVerdict::Outcome(RunOutcome::Paused) => (
                EventKind::WorkflowPaused,
                Box::new(move |wf| {
                    wf.run.status = WorkflowStatus::Paused;
                    wf.run.updated_at_ms = now;
                }),
            ),
            DriverVerdict::Failed(error) => {
                let event_error = error.clone();
                (
                    EventKind::WorkflowFailed { error: event_error, duration_ms },
                    Box::new(move |wf| {
                        wf.set_failed(error, now);
                    }),
                )
            }
        };

    let result: Result<(), StoreError> = ctx.store.execute_atomically(|txn| {
        let mut wf = match txn.load_by_id(id) {
            Ok(wf) => wf,
            Err(StoreError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        // A force-stop may have already moved the workflow off Running.
        if wf.run.status == WorkflowStatus::Running {
            transition(&mut wf);
            txn.save(wf);
        }
        Ok(())
    });
    if let Err(e) = result {
        error!(workflow_id = %id, error = %e, "terminal transition failed");
    }

    match &event_kind {
        EventKind::WorkflowCompleted { .. } => {
            info!(workflow_id = %id, duration_ms, "workflow completed")
        }
        EventKind::WorkflowFailed { error, .. } => {
            warn!(workflow_id = %id, duration_ms, error = %error, "workflow failed")
        }
        _ => info!(workflow_id = %id, event = event_kind.name(), "workflow settled"),
    }

    ctx.bus.publish(qm_core::Event::new(id, project_id, now, event_kind));
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
