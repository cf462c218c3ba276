// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable job registry: one JSON snapshot plus one append-only JSONL run
//! log per job. All mutators persist before returning; all
//! updates are serialized through a single mutex so CAS failure is
//! observable without partial state exposure.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use warden_core::{Job, JobId, LastStatus, RunRecord, RunUlid};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The complete materialized registry state, round-trippable to a single
/// JSON document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct MaterializedState {
    pub jobs: HashMap<String, Job>,
    pub kill_switch_active: bool,
}

struct Inner {
    state: MaterializedState,
    snapshot_path: PathBuf,
    run_logs_dir: PathBuf,
    kill_switch_sentinel: PathBuf,
}

impl Inner {
    fn persist_snapshot(&self) -> Result<(), RegistryError> {
        atomic_write_json(&self.snapshot_path, &self.state)
    }

    fn run_log_path(&self, job_id: &JobId) -> PathBuf {
        self.run_logs_dir.join(format!("{}.jsonl", job_id.as_str()))
    }
}

/// Write `value` to `path` atomically: write to a `.tmp` sibling, fsync,
/// then rename over the destination.
pub(crate) fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RegistryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Durable job registry.
pub struct JobRegistry {
    inner: Mutex<Inner>,
}

impl JobRegistry {
    /// Open (or initialize) a registry rooted at `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, RegistryError> {
        let snapshot_path = data_dir.join("registry.json");
        let run_logs_dir = data_dir.join("runs");
        let kill_switch_sentinel = data_dir.join("kill_switch.active");
        fs::create_dir_all(&run_logs_dir)?;

        let state = if snapshot_path.exists() {
            let bytes = fs::read(&snapshot_path)?;
            serde_json::from_slice(&bytes)?
        } else {
            MaterializedState::default()
        };

        Ok(Self {
            inner: Mutex::new(Inner {
                state,
                snapshot_path,
                run_logs_dir,
                kill_switch_sentinel,
            }),
        })
    }

    pub fn add_job(&self, job: Job) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        inner.state.jobs.insert(job.id.as_str().to_string(), job);
        inner.persist_snapshot()
    }

    /// Apply `patch` to a job's fields and persist. Returns `false` if the
    /// job doesn't exist.
    pub fn update_job<F: FnOnce(&mut Job)>(
        &self,
        id: &JobId,
        patch: F,
    ) -> Result<bool, RegistryError> {
        let mut inner = self.inner.lock();
        let Some(job) = inner.state.jobs.get_mut(id.as_str()) else {
            return Ok(false);
        };
        patch(job);
        inner.persist_snapshot()?;
        Ok(true)
    }

    pub fn delete_job(&self, id: &JobId) -> Result<bool, RegistryError> {
        let mut inner = self.inner.lock();
        let removed = inner.state.jobs.remove(id.as_str()).is_some();
        if removed {
            inner.persist_snapshot()?;
        }
        Ok(removed)
    }

    pub fn get_job(&self, id: &JobId) -> Option<Job> {
        self.inner.lock().state.jobs.get(id.as_str()).cloned()
    }

    pub fn get_jobs(&self) -> Vec<Job> {
        self.inner.lock().state.jobs.values().cloned().collect()
    }

    /// Atomic compare-and-swap claim. Succeeds iff the job exists and is
    /// unclaimed.
    pub fn try_claim_run(
        &self,
        id: &JobId,
        run_ulid: RunUlid,
        now_ms: i64,
    ) -> Result<bool, RegistryError> {
        let mut inner = self.inner.lock();
        if inner.state.kill_switch_active {
            return Ok(false);
        }
        let Some(job) = inner.state.jobs.get_mut(id.as_str()) else {
            return Ok(false);
        };
        let claimed = job.claim(run_ulid, now_ms);
        if claimed {
            inner.persist_snapshot()?;
        }
        Ok(claimed)
    }

    /// Release a run claim. Succeeds iff `run_ulid` matches the current
    /// claim.
    pub fn release_run(
        &self,
        id: &JobId,
        run_ulid: &RunUlid,
        last_status: LastStatus,
        now_ms: i64,
    ) -> Result<bool, RegistryError> {
        let mut inner = self.inner.lock();
        let Some(job) = inner.state.jobs.get_mut(id.as_str()) else {
            return Ok(false);
        };
        let released = job.release(run_ulid, last_status, now_ms);
        if released {
            inner.persist_snapshot()?;
        }
        Ok(released)
    }

    /// Clear any claim whose `last_run_at_ms` is older than `max_age_ms`.
    /// Skips jobs whose claim is recent. Returns the ids recovered.
    /// Idempotent: running this twice in a row produces an empty second
    /// result because the first pass already cleared every stale claim.
    pub fn recover_stuck_jobs(
        &self,
        max_age_ms: i64,
        now_ms: i64,
    ) -> Result<Vec<JobId>, RegistryError> {
        let mut inner = self.inner.lock();
        let mut recovered = Vec::new();
        for job in inner.state.jobs.values_mut() {
            if !job.is_claimed() {
                continue;
            }
            let age = job
                .last_run_at_ms
                .map(|t| now_ms - t)
                .unwrap_or(i64::MAX);
            if age >= max_age_ms {
                job.mark_stuck(now_ms);
                recovered.push(job.id.clone());
            }
        }
        if !recovered.is_empty() {
            inner.persist_snapshot()?;
        }
        Ok(recovered)
    }

    pub fn set_kill_switch(&self, active: bool) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        inner.state.kill_switch_active = active;
        if active {
            File::create(&inner.kill_switch_sentinel)?;
        } else if inner.kill_switch_sentinel.exists() {
            fs::remove_file(&inner.kill_switch_sentinel)?;
        }
        inner.persist_snapshot()
    }

    pub fn is_kill_switch_active(&self) -> bool {
        self.inner.lock().state.kill_switch_active
    }

    /// Append a run record to the job's JSONL log. Never rewritten.
    pub fn append_run_record(&self, record: &RunRecord) -> Result<(), RegistryError> {
        let inner = self.inner.lock();
        let path = inner.run_log_path(&record.job_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        file.sync_all()?;
        Ok(())
    }

    /// Read a job's run records, most recent last, with pagination.
    pub fn read_run_records(
        &self,
        job_id: &JobId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RunRecord>, RegistryError> {
        let path = self.inner.lock().run_log_path(job_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(path)?;
        let mut records = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str::<RunRecord>(line)?);
        }
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
