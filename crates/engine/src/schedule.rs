// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Computes the next `next_run_at_ms` for a job's [`Schedule`]. `cron`
//! expressions are standard 5-field; the `cron` crate parses 6/7-field
//! expressions with a leading seconds field, so a literal `"0 "` is
//! prepended before parsing.

use chrono::{TimeZone, Utc};
use std::str::FromStr;
use thiserror::Error;
use warden_core::Schedule;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{0}': {1}")]
    InvalidCron(String, String),
}

/// Compute the next fire time strictly after `now_ms`, or `None` if the
/// schedule has no future occurrence (a `once` schedule whose `at_ms` has
/// already elapsed still returns `Some(at_ms)` — it's still due, just in
/// the past — callers compare against "now" separately).
pub fn next_run_after(schedule: &Schedule, now_ms: i64) -> Result<Option<i64>, ScheduleError> {
    match schedule {
        Schedule::Every { interval_ms } => Ok(Some(now_ms + *interval_ms as i64)),
        Schedule::Once { at_ms } => Ok(Some(*at_ms)),
        Schedule::Cron { expression } => {
            let with_seconds = format!("0 {expression}");
            let parsed = cron::Schedule::from_str(&with_seconds)
                .map_err(|e| ScheduleError::InvalidCron(expression.clone(), e.to_string()))?;
            let after = Utc
                .timestamp_millis_opt(now_ms)
                .single()
                .unwrap_or_else(Utc::now);
            Ok(parsed.after(&after).next().map(|dt| dt.timestamp_millis()))
        }
    }
}
