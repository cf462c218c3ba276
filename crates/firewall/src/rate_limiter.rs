// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sliding-window-over-fixed-budget rate limiting per (tool, optional job).
//! Windows refill by wall-clock elapsed; there is no background timer,
//! every call consults the injected clock directly.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use warden_core::Clock;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Max calls allowed per window, per tool (global) or per (tool, job).
    pub capacity: u32,
    pub window_ms: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 60,
            window_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    window_start_ms: i64,
}

impl Bucket {
    fn fresh(now_ms: i64) -> Self {
        Self {
            count: 0,
            window_start_ms: now_ms,
        }
    }

    fn roll_if_expired(&mut self, now_ms: i64, window_ms: i64) {
        if now_ms - self.window_start_ms >= window_ms {
            self.count = 0;
            self.window_start_ms = now_ms;
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Remaining {
    pub global: u32,
    pub job: Option<u32>,
}

struct State {
    global: HashMap<String, Bucket>,
    per_job: HashMap<(String, String), Bucket>,
}

/// Per-instance rate limiter. Never a process-wide singleton: each
/// `RateLimiter` owns its own mutex-guarded buckets so tests (and separate
/// daemon instances) don't cross-contaminate.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    global_config: RateLimitConfig,
    job_config: RateLimitConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, global_config: RateLimitConfig, job_config: RateLimitConfig) -> Self {
        Self {
            clock,
            global_config,
            job_config,
            state: Mutex::new(State {
                global: HashMap::new(),
                per_job: HashMap::new(),
            }),
        }
    }

    /// Attempt to consume one token for `tool`, and for `(tool, job_id)` if
    /// a job scope is given. Fails (and consumes nothing) if either bucket
    /// is depleted.
    pub fn try_consume(&self, tool: &str, job_id: Option<&str>) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        let global_bucket = state
            .global
            .entry(tool.to_string())
            .or_insert_with(|| Bucket::fresh(now));
        global_bucket.roll_if_expired(now, self.global_config.window_ms);
        if global_bucket.count >= self.global_config.capacity {
            return false;
        }

        if let Some(job_id) = job_id {
            let key = (tool.to_string(), job_id.to_string());
            let job_bucket = state
                .per_job
                .entry(key)
                .or_insert_with(|| Bucket::fresh(now));
            job_bucket.roll_if_expired(now, self.job_config.window_ms);
            if job_bucket.count >= self.job_config.capacity {
                return false;
            }
        }

        // Both checks passed; commit both increments.
        if let Some(bucket) = state.global.get_mut(tool) {
            bucket.count += 1;
        }
        if let Some(job_id) = job_id {
            let key = (tool.to_string(), job_id.to_string());
            if let Some(bucket) = state.per_job.get_mut(&key) {
                bucket.count += 1;
            }
        }
        true
    }

    pub fn get_remaining(&self, tool: &str, job_id: Option<&str>) -> Remaining {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();

        let global_remaining = {
            let bucket = state
                .global
                .entry(tool.to_string())
                .or_insert_with(|| Bucket::fresh(now));
            bucket.roll_if_expired(now, self.global_config.window_ms);
            self.global_config.capacity.saturating_sub(bucket.count)
        };

        let job_remaining = job_id.map(|job_id| {
            let key = (tool.to_string(), job_id.to_string());
            let bucket = state
                .per_job
                .entry(key)
                .or_insert_with(|| Bucket::fresh(now));
            bucket.roll_if_expired(now, self.job_config.window_ms);
            self.job_config.capacity.saturating_sub(bucket.count)
        });

        Remaining {
            global: global_remaining,
            job: job_remaining,
        }
    }
}

#[cfg(test)]
#[path = "rate_limiter_tests.rs"]
mod tests;
