// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only, hash-chained audit log.
//!
//! Every firewalled tool call is paired with exactly one of `denied`,
//! `dry_run`, or an (`intent`, `result`) pair. Entries are persisted as a
//! line-delimited JSON stream; `hash = SHA-256(canonicalJSON(entry without
//! hash))` and `prevHash` of entry *n* equals `hash` of entry *n-1*
//! (genesis = literal string `"genesis"`). Canonical JSON here relies on
//! `serde_json::Map`'s default `BTreeMap` backing (no `preserve_order`
//! feature enabled anywhere in the workspace), which sorts object keys for
//! free.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use warden_core::{AuditPhase, JobId, RunUlid};

pub const GENESIS: &str = "genesis";

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no matching intent for seq {0}")]
    UnknownIntent(u64),
}

/// Process-wide run context injected into subsequent entries.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub job_id: Option<JobId>,
    pub run_ulid: Option<RunUlid>,
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub phase: AuditPhase,
    pub action: String,
    pub target: String,
    pub params: serde_json::Value,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_remaining: Option<u64>,
    pub prev_hash: String,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_ulid: Option<RunUlid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

/// The same shape minus `hash`, used to compute the hash itself.
#[derive(Serialize)]
struct UnhashedEntry<'a> {
    seq: u64,
    phase: AuditPhase,
    action: &'a str,
    target: &'a str,
    params: &'a serde_json::Value,
    dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    intent_seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: &'a Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: &'a Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit_remaining: Option<u64>,
    prev_hash: &'a str,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: &'a Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_ulid: &'a Option<RunUlid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id: &'a Option<String>,
}

fn compute_hash(entry: &UnhashedEntry<'_>) -> Result<String, AuditError> {
    let canonical = serde_json::to_string(entry)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Result of [`AuditLog::verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    pub valid: bool,
    pub broken_at: Option<u64>,
    pub entry_count: u64,
}

/// A single append-only hash-chained log file, with optional size-triggered
/// rotation into a numbered series of sibling files.
pub struct AuditLog {
    file: File,
    path: PathBuf,
    seq: u64,
    last_hash: String,
    ctx: RunContext,
    series: Option<RotationSeries>,
}

/// Rotation bookkeeping: the base stem/extension the series rotates
/// around, the current file's index within it, and the byte threshold that
/// triggers the next rotation.
struct RotationSeries {
    dir: PathBuf,
    stem: String,
    extension: String,
    index: u32,
    rotate_at_bytes: u64,
    all_paths: Vec<PathBuf>,
}

impl RotationSeries {
    fn path_for(&self, index: u32) -> PathBuf {
        if index == 0 {
            self.dir.join(format!("{}.{}", self.stem, self.extension))
        } else {
            self.dir
                .join(format!("{}.{index}.{}", self.stem, self.extension))
        }
    }
}

impl AuditLog {
    /// Open or create the log at `path`, truncating any torn (unparseable)
    /// trailing line before accepting new writes. No rotation: `path`
    /// grows without bound. Use [`AuditLog::open_rotating`] for a daemon
    /// that should cap file size.
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (seq, last_hash) = Self::recover(path)?;

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            seq,
            last_hash,
            ctx: RunContext::default(),
            series: None,
        })
    }

    /// Open (or resume) a rotating series of audit files rooted at
    /// `base_path` (e.g. `.../audit.jsonl`). Rotated files are named
    /// `audit.1.jsonl`, `audit.2.jsonl`, etc. Resumes appending to the
    /// highest-numbered existing file in the series; rotates to a new file
    /// once the current one reaches `rotate_at_bytes`, seeding the new
    /// file's first `prevHash` with the closed file's last `hash` so
    /// [`verify_chain_files`] still validates across the boundary.
    pub fn open_rotating(base_path: &Path, rotate_at_bytes: u64) -> Result<Self, AuditError> {
        let dir = base_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)?;

        let stem = base_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audit".to_string());
        let extension = base_path
            .extension()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "jsonl".to_string());

        let mut series = RotationSeries {
            dir,
            stem,
            extension,
            index: 0,
            rotate_at_bytes,
            all_paths: Vec::new(),
        };

        // Find the highest-numbered file that already exists; that's where
        // we resume appending. `all_paths` collects every file in the
        // series in order, oldest first, for full-chain verification.
        let mut index = 0u32;
        loop {
            let candidate = series.path_for(index);
            if candidate.exists() {
                series.all_paths.push(candidate);
                index += 1;
            } else {
                break;
            }
        }
        series.index = index.saturating_sub(1);

        let path = series.path_for(series.index);
        let (seq, last_hash) = Self::recover(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        if series.all_paths.is_empty() {
            series.all_paths.push(path.clone());
        }

        Ok(Self {
            file,
            path,
            seq,
            last_hash,
            ctx: RunContext::default(),
            series: Some(series),
        })
    }

    /// Every file in the rotation series, oldest first, suitable for
    /// [`verify_chain_files`]. A single-file (non-rotating) log returns
    /// just its own path.
    pub fn series_paths(&self) -> Vec<PathBuf> {
        match &self.series {
            Some(series) => series.all_paths.clone(),
            None => vec![self.path.clone()],
        }
    }

    /// Close the current file and begin a fresh one, continuing the hash
    /// chain with this file's last hash as the new file's genesis `prevHash`
    /// and `seq` reset to 0 (`seq` is strictly increasing per log file, not
    /// across the whole series). No-op on a non-rotating log.
    fn rotate(&mut self) -> Result<(), AuditError> {
        let Some(series) = self.series.as_mut() else {
            return Ok(());
        };
        self.file.sync_all()?;

        series.index += 1;
        let next_path = series.path_for(series.index);
        let next_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&next_path)?;

        tracing::info!(
            from = %self.path.display(),
            to = %next_path.display(),
            "rotating audit log"
        );

        series.all_paths.push(next_path.clone());
        self.path = next_path;
        self.file = next_file;
        self.seq = 0;
        // `self.last_hash` is left untouched: it seeds the new file's
        // first entry's `prevHash`, preserving the chain across rotation.
        Ok(())
    }

    /// Rotate now if the current file has grown past the configured
    /// threshold. Called after every append; a no-op for non-rotating logs
    /// or while under threshold.
    fn maybe_rotate(&mut self) -> Result<(), AuditError> {
        let Some(rotate_at_bytes) = self.series.as_ref().map(|s| s.rotate_at_bytes) else {
            return Ok(());
        };
        let size = self.file.metadata()?.len();
        if size >= rotate_at_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    /// Scan the file, truncating to the last fully-parseable line. Returns
    /// `(last_seq, last_hash)`, `(0, GENESIS)` for an empty/missing file.
    fn recover(path: &Path) -> Result<(u64, String), AuditError> {
        if !path.exists() {
            return Ok((0, GENESIS.to_string()));
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut valid_lines: Vec<String> = Vec::new();
        let mut last_seq = 0u64;
        let mut last_hash = GENESIS.to_string();
        let mut corrupt = false;

        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => {
                    corrupt = true;
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => {
                    last_seq = entry.seq;
                    last_hash = entry.hash.clone();
                    valid_lines.push(line);
                }
                Err(_) => {
                    corrupt = true;
                    break;
                }
            }
        }

        if corrupt {
            warn!(path = %path.display(), kept = valid_lines.len(), "truncating torn audit log tail");
            let tmp = path.with_extension("tmp");
            {
                let mut f = File::create(&tmp)?;
                for l in &valid_lines {
                    writeln!(f, "{l}")?;
                }
                f.sync_all()?;
            }
            std::fs::rename(&tmp, path)?;
        }

        Ok((last_seq, last_hash))
    }

    pub fn set_run_context(&mut self, ctx: RunContext) {
        self.ctx = ctx;
    }

    pub fn clear_run_context(&mut self) {
        self.ctx = RunContext::default();
    }

    fn append(
        &mut self,
        phase: AuditPhase,
        action: &str,
        target: &str,
        params: serde_json::Value,
        dry_run: bool,
        intent_seq: Option<u64>,
        result: Option<serde_json::Value>,
        error: Option<String>,
        rate_limit_remaining: Option<u64>,
    ) -> Result<u64, AuditError> {
        self.seq += 1;
        let seq = self.seq;
        let timestamp = Utc::now();

        let unhashed = UnhashedEntry {
            seq,
            phase,
            action,
            target,
            params: &params,
            dry_run,
            intent_seq,
            result: &result,
            error: &error,
            rate_limit_remaining,
            prev_hash: &self.last_hash,
            timestamp,
            job_id: &self.ctx.job_id,
            run_ulid: &self.ctx.run_ulid,
            template_id: &self.ctx.template_id,
        };
        let hash = compute_hash(&unhashed)?;

        let entry = AuditEntry {
            seq,
            phase,
            action: action.to_string(),
            target: target.to_string(),
            params,
            dry_run,
            intent_seq,
            result,
            error,
            rate_limit_remaining,
            prev_hash: self.last_hash.clone(),
            hash: hash.clone(),
            timestamp,
            job_id: self.ctx.job_id.clone(),
            run_ulid: self.ctx.run_ulid.clone(),
            template_id: self.ctx.template_id.clone(),
        };

        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{line}")?;
        self.file.sync_all()?;

        self.last_hash = hash;
        self.maybe_rotate()?;
        Ok(seq)
    }

    pub fn record_intent(
        &mut self,
        action: &str,
        target: &str,
        params: serde_json::Value,
        dry_run: bool,
    ) -> Result<u64, AuditError> {
        self.append(
            AuditPhase::Intent,
            action,
            target,
            params,
            dry_run,
            None,
            None,
            None,
            None,
        )
    }

    pub fn record_result(
        &mut self,
        intent_seq: u64,
        action: &str,
        target: &str,
        result: Result<serde_json::Value, String>,
        rate_limit_remaining: Option<u64>,
    ) -> Result<u64, AuditError> {
        let (result, error) = match result {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(e)),
        };
        self.append(
            AuditPhase::Result,
            action,
            target,
            serde_json::Value::Null,
            false,
            Some(intent_seq),
            result,
            error,
            rate_limit_remaining,
        )
    }

    pub fn record_denied(
        &mut self,
        action: &str,
        target: &str,
        params: serde_json::Value,
        reason: &str,
    ) -> Result<u64, AuditError> {
        self.append(
            AuditPhase::Denied,
            action,
            target,
            params,
            false,
            None,
            None,
            Some(reason.to_string()),
            None,
        )
    }

    pub fn record_dry_run(
        &mut self,
        action: &str,
        target: &str,
        params: serde_json::Value,
    ) -> Result<u64, AuditError> {
        self.append(
            AuditPhase::DryRun,
            action,
            target,
            params,
            true,
            None,
            Some(serde_json::json!({"intercepted": true})),
            None,
            None,
        )
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replay every file in the series (or just this one, for a
    /// non-rotating log) from genesis, verifying the hash chain across any
    /// rotation boundaries.
    pub fn verify_chain(&self) -> Result<ChainVerification, AuditError> {
        verify_chain_files(&self.series_paths(), GENESIS)
    }
}

/// Replay a single audit file from genesis and verify its hash chain.
pub fn verify_chain_file(path: &Path) -> Result<ChainVerification, AuditError> {
    verify_chain_files(&[path.to_path_buf()], GENESIS)
}

/// Replay a sequence of rotated audit files in order, verifying the chain
/// across rotation boundaries: `prevHash` of the first entry in file N+1
/// must equal `hash` of the last entry in file N.
pub fn verify_chain_files(
    paths: &[PathBuf],
    expected_genesis_prev: &str,
) -> Result<ChainVerification, AuditError> {
    let mut expected_prev = expected_genesis_prev.to_string();
    let mut line_no: u64 = 0;

    for path in paths {
        if !path.exists() {
            continue;
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        for line in reader.lines() {
            line_no += 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = match serde_json::from_str(&line) {
                Ok(e) => e,
                Err(_) => {
                    return Ok(ChainVerification {
                        valid: false,
                        broken_at: Some(line_no),
                        entry_count: line_no,
                    })
                }
            };

            if entry.prev_hash != expected_prev {
                return Ok(ChainVerification {
                    valid: false,
                    broken_at: Some(line_no),
                    entry_count: line_no,
                });
            }

            let unhashed = UnhashedEntry {
                seq: entry.seq,
                phase: entry.phase,
                action: &entry.action,
                target: &entry.target,
                params: &entry.params,
                dry_run: entry.dry_run,
                intent_seq: entry.intent_seq,
                result: &entry.result,
                error: &entry.error,
                rate_limit_remaining: entry.rate_limit_remaining,
                prev_hash: &entry.prev_hash,
                timestamp: entry.timestamp,
                job_id: &entry.job_id,
                run_ulid: &entry.run_ulid,
                template_id: &entry.template_id,
            };
            let recomputed = compute_hash(&unhashed)?;
            if recomputed != entry.hash {
                return Ok(ChainVerification {
                    valid: false,
                    broken_at: Some(line_no),
                    entry_count: line_no,
                });
            }

            expected_prev = entry.hash;
        }
    }

    Ok(ChainVerification {
        valid: true,
        broken_at: None,
        entry_count: line_no,
    })
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
