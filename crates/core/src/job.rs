// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identity, schedule and state machine.

use crate::id::{JobId, RunUlid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a job is scheduled to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Fires every `interval_ms` milliseconds.
    Every { interval_ms: u64 },
    /// Fires per a cron expression (standard 5-field, interpreted by the
    /// Cron Service).
    Cron { expression: String },
    /// Fires exactly once at the given epoch millisecond.
    Once { at_ms: i64 },
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Enabled,
    Armed,
    Running,
    Disabled,
    Stuck,
}

/// What happens when a due job is already running.
///
/// `Queue` is accepted as valid config but currently behaves the same as
/// `Skip` until a real FIFO waiting list lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    Skip,
    Queue,
}

/// Terminal outcome of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastStatus {
    Success,
    Failure,
    Timeout,
}

/// Classification used by the circuit breaker to decide whether a tool/run
/// failure is countable towards tripping the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Retriable upstream hiccup (5xx). Countable.
    Transient,
    /// Upstream asked us to slow down (429, or 403 with Retry-After).
    /// Countable.
    RateLimited,
    /// Client-side mistake (422). Countable.
    Permanent,
    /// Known/benign absence (404). Not countable.
    Expected,
    /// Anything else unclassified upstream failure. Countable.
    External,
}

impl FailureClass {
    /// Maps an HTTP status code (plus whether a `Retry-After` header was
    /// present) to a failure class.
    pub fn from_http_status(status: u16, has_retry_after: bool) -> Self {
        match status {
            429 => FailureClass::RateLimited,
            403 if has_retry_after => FailureClass::RateLimited,
            403 => FailureClass::External,
            404 => FailureClass::Expected,
            422 => FailureClass::Permanent,
            s if (500..600).contains(&s) => FailureClass::Transient,
            _ => FailureClass::External,
        }
    }

    /// Whether this class counts towards the circuit breaker's rolling
    /// failure window.
    pub fn is_countable(self) -> bool {
        !matches!(self, FailureClass::Expected)
    }
}

/// Three-state circuit breaker machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Persisted circuit breaker state, embedded in a [`Job`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub state: BreakerState,
    pub failures: u32,
    pub successes: u32,
    pub opened_at_ms: Option<i64>,
    pub half_open_at_ms: Option<i64>,
    pub last_failure_at_ms: Option<i64>,
    /// Epoch-ms timestamps of countable failures within the rolling window.
    #[serde(default)]
    pub failure_timestamps: Vec<i64>,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            failures: 0,
            successes: 0,
            opened_at_ms: None,
            half_open_at_ms: None,
            last_failure_at_ms: None,
            failure_timestamps: Vec::new(),
        }
    }
}

/// Configuration for creating a new job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub id: JobId,
    pub name: String,
    pub template_id: String,
    pub schedule: Schedule,
    pub concurrency_policy: ConcurrencyPolicy,
    pub one_shot: bool,
    pub config: serde_json::Value,
}

/// A job instance.
///
/// Invariant: `current_run_ulid.is_some() <=> status == Running`. Enforced
/// by [`Job::claim`] / [`Job::release`]; nothing else should mutate either
/// field directly. Ownership: the registry owns all jobs; the scheduler is
/// the sole mutator of `status` and `next_run_at_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub template_id: String,
    pub schedule: Schedule,
    pub status: JobStatus,
    pub concurrency_policy: ConcurrencyPolicy,
    pub enabled: bool,
    pub one_shot: bool,
    pub config: serde_json::Value,
    pub circuit_breaker: CircuitBreakerState,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub last_run_at_ms: Option<i64>,
    pub next_run_at_ms: Option<i64>,
    pub last_status: Option<LastStatus>,
    pub current_run_ulid: Option<RunUlid>,
    /// Cron name the job was spawned from, if any.
    #[serde(default)]
    pub cron_name: Option<String>,
}

impl Job {
    pub fn new(config: JobConfig, now_ms: i64) -> Self {
        Self {
            id: config.id,
            name: config.name,
            template_id: config.template_id,
            schedule: config.schedule,
            status: JobStatus::Enabled,
            concurrency_policy: config.concurrency_policy,
            enabled: true,
            one_shot: config.one_shot,
            config: config.config,
            circuit_breaker: CircuitBreakerState::default(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            last_run_at_ms: None,
            next_run_at_ms: None,
            last_status: None,
            current_run_ulid: None,
            cron_name: None,
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.current_run_ulid.is_some()
    }

    /// Arm the job with a future `next_run_at_ms`. No-op on a running job.
    pub fn arm(&mut self, next_run_at_ms: i64, now_ms: i64) {
        if self.status == JobStatus::Running {
            return;
        }
        self.next_run_at_ms = Some(next_run_at_ms);
        self.status = JobStatus::Armed;
        self.updated_at_ms = now_ms;
    }

    /// Compare-and-swap claim: succeeds only if unclaimed.
    pub fn claim(&mut self, run_ulid: RunUlid, now_ms: i64) -> bool {
        if self.current_run_ulid.is_some() {
            return false;
        }
        self.current_run_ulid = Some(run_ulid);
        self.status = JobStatus::Running;
        self.last_run_at_ms = Some(now_ms);
        self.updated_at_ms = now_ms;
        true
    }

    /// Release a claim held by `run_ulid`. Succeeds only if it matches the
    /// current claim. A one-shot job that just succeeded is disabled here
    /// rather than at claim time, so a failed attempt stays eligible.
    pub fn release(&mut self, run_ulid: &RunUlid, last_status: LastStatus, now_ms: i64) -> bool {
        if self.current_run_ulid.as_ref() != Some(run_ulid) {
            return false;
        }
        self.current_run_ulid = None;
        self.last_status = Some(last_status);
        self.updated_at_ms = now_ms;
        if self.one_shot && last_status == LastStatus::Success {
            self.enabled = false;
            self.status = JobStatus::Disabled;
        } else {
            self.status = match self.next_run_at_ms {
                Some(next) if next > now_ms => JobStatus::Armed,
                _ => JobStatus::Enabled,
            };
        }
        true
    }

    /// Mark the job stuck (crash recovery). Clears the claim unconditionally
    /// and leaves `status` at `Stuck` until an operator re-arms it.
    pub fn mark_stuck(&mut self, now_ms: i64) {
        self.current_run_ulid = None;
        self.last_status = Some(LastStatus::Timeout);
        self.status = JobStatus::Stuck;
        self.updated_at_ms = now_ms;
    }

    /// Disable the job, clearing any claim it held (used by the kill
    /// switch).
    pub fn disable_and_clear_claim(&mut self, now_ms: i64) {
        self.current_run_ulid = None;
        self.enabled = false;
        self.status = JobStatus::Disabled;
        self.updated_at_ms = now_ms;
    }
}

/// A per-run-attempt terminal summary. Append-only, one per
/// `(job_id, run_ulid)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_id: JobId,
    pub run_ulid: RunUlid,
    pub started_at_ms: i64,
    pub finished_at_ms: Option<i64>,
    pub status: RunStatus,
    pub items_processed: u32,
    pub tool_calls: u32,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failure,
    Timeout,
}

/// An item produced by a template's `resolveItems`, with a content hash
/// used by the runner's change-tracking context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateItem {
    pub key: String,
    pub hash: String,
    pub data: serde_json::Value,
}

/// Per-run change tracker handed to the Job Runner: has this item's hash
/// changed since we last observed it?
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeTracker {
    seen: HashMap<String, String>,
}

impl ChangeTracker {
    pub fn has_changed(&self, key: &str, hash: &str) -> bool {
        self.seen.get(key).map(|h| h.as_str()) != Some(hash)
    }

    pub fn update(&mut self, key: &str, hash: &str) {
        self.seen.insert(key.to_string(), hash.to_string());
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
