// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage for a job's per-item [`ChangeTracker`]:
//! one small JSON file per job, snapshot-written the same way the registry
//! writes its own snapshot (write-temp, fsync, rename).

use std::fs;
use std::path::{Path, PathBuf};
use warden_core::{ChangeTracker, JobId};

use crate::registry::{atomic_write_json, RegistryError};

pub struct ChangeTrackerStore {
    dir: PathBuf,
}

impl ChangeTrackerStore {
    pub fn open(data_dir: &Path) -> Result<Self, RegistryError> {
        let dir = data_dir.join("change_trackers");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("{}.json", job_id.as_str()))
    }

    pub fn load(&self, job_id: &JobId) -> Result<ChangeTracker, RegistryError> {
        let path = self.path(job_id);
        if !path.exists() {
            return Ok(ChangeTracker::default());
        }
        let bytes = fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, job_id: &JobId, tracker: &ChangeTracker) -> Result<(), RegistryError> {
        atomic_write_json(&self.path(job_id), tracker)
    }
}
