// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global kill switch: a durable latch that blocks new runs and
//! disables every in-flight/armed job atomically. Backed by
//! `warden_storage::JobRegistry`'s sentinel-file + snapshot-boolean
//! persistence; this type adds the "walk all running jobs and reap their
//! claims" behavior on top.

use std::sync::Arc;
use warden_core::{Clock, JobId, JobStatus};
use warden_storage::{JobRegistry, RegistryError};

/// Global kill switch. One instance per daemon process, shared with the
/// Cron Service so `runDueJobs`/`triggerJob` can observe it before claiming
/// a run.
pub struct KillSwitch {
    registry: Arc<JobRegistry>,
    clock: Arc<dyn Clock>,
}

impl KillSwitch {
    pub fn new(registry: Arc<JobRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    pub fn is_active(&self) -> bool {
        self.registry.is_kill_switch_active()
    }

    /// Sets the durable latch, then walks every job whose status is
    /// `running`, disabling it and clearing its claim (returning ownership
    /// of the run token to the scheduler so a later claim doesn't observe a
    /// stale holder). Returns the ids of jobs it stopped.
    pub fn activate(&self) -> Result<Vec<JobId>, RegistryError> {
        self.registry.set_kill_switch(true)?;

        let now = self.clock.now_ms();
        let mut stopped = Vec::new();
        for job in self.registry.get_jobs() {
            if job.status != JobStatus::Running {
                continue;
            }
            let id = job.id.clone();
            self.registry.update_job(&id, |j| {
                j.disable_and_clear_claim(now);
            })?;
            stopped.push(id);
        }
        Ok(stopped)
    }

    /// Clears the latch. Does not re-enable any job the activation
    /// disabled — re-enabling is an explicit operator action.
    pub fn deactivate(&self) -> Result<(), RegistryError> {
        self.registry.set_kill_switch(false)
    }
}

#[cfg(test)]
#[path = "kill_switch_tests.rs"]
mod tests;
