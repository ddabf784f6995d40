// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic sweep recovering workflows whose owning process died.
//!
//! Compares the running-workflows registry against live process identity on
//! this host. A row is reaped only when its holder is provably dead here:
//! rows owned by other hosts, live PIDs, or workflows with in-memory handles
//! are left alone. Per-workflow failures never abort the sweep.

use qm_core::{Clock, SystemClock, WorkflowStatus};
use qm_storage::{StateStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tracker::UnifiedTracker;

/// Default sweep interval.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Recovers orphaned registry rows left by crashed processes.
pub struct OrphanReaper<C: Clock = SystemClock> {
    store: Arc<StateStore>,
    tracker: Arc<UnifiedTracker<C>>,
    clock: C,
    host: String,
}

impl<C: Clock> OrphanReaper<C> {
    pub fn new(store: Arc<StateStore>, tracker: Arc<UnifiedTracker<C>>, clock: C) -> Self {
        Self {
            store,
            tracker,
            clock,
            host: gethostname::gethostname().to_string_lossy().into_owned(),
        }
    }

    /// One sweep. Returns how many workflows were reaped.
    pub fn cleanup_orphaned_workflows(&self) -> usize {
        let mut reaped = 0;
        for row in self.store.list_running_workflows() {
            let id = row.workflow_id.to_string();

            // Tracked in memory means this process owns it.
            if self.tracker.has_handle(&id) {
                continue;
            }

            // Refetch: the row may have been cleared since the listing.
            let Some(record) = self.store.get_running_workflow_record(&id) else {
                continue;
            };
            // Without holder metadata there is nothing to prove; skip.
            let (Some(pid), Some(host)) = (record.pid, record.host.clone()) else {
                debug!(workflow_id = %id, "registry row has no holder metadata, skipping");
                continue;
            };
            if !self.is_local_host(&host) {
                debug!(workflow_id = %id, holder_host = %host, "lock held on another host, skipping");
                continue;
            }
            if pid_alive(pid) {
                continue;
            }

            match self.reap(&id, pid, &host) {
                Ok(true) => {
                    info!(workflow_id = %id, pid, host = %host, "reaped orphaned workflow");
                    reaped += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(workflow_id = %id, error = %e, "failed to reap orphan, continuing sweep");
                }
            }
        }
        reaped
    }

    /// Sweep repeatedly until shutdown.
    pub async fn run_loop(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    let reaped = self.cleanup_orphaned_workflows();
                    if reaped > 0 {
                        info!(reaped, "orphan sweep recovered workflows");
                    }
                }
            }
        }
    }

    /// Atomically clear the registry row and fail the workflow, but only if
    /// the row still names the dead holder we probed (a real start may have
    /// raced us) and the status is still Running.
    fn reap(&self, id: &str, pid: u32, host: &str) -> Result<bool, StoreError> {
        let now = self.clock.epoch_ms();
        self.store.execute_atomically(|txn| -> Result<bool, StoreError> {
            let Some(current) = txn.get_running_workflow_record(id) else {
                return Ok(false);
            };
            if current.pid != Some(pid) {
                return Ok(false);
            }
            txn.clear_workflow_running(id);
            match txn.load_by_id(id) {
                Ok(mut wf) => {
                    if wf.run.status == WorkflowStatus::Running {
                        wf.set_failed(
                            format!("orphaned: lock holder process {pid} on {host} is dead"),
                            now,
                        );
                        txn.save(wf);
                    }
                }
                // Registry row without a workflow record: just drop the row.
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            Ok(true)
        })
    }

    fn is_local_host(&self, host: &str) -> bool {
        // "localhost" is accepted as an alias for this host so registries
        // written with a loopback identity still get recovered here.
        host == self.host || host == "localhost"
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Signal-0 probe on unix; elsewhere only the current process counts as live.
fn pid_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => true,
            // Process exists but belongs to someone else.
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
