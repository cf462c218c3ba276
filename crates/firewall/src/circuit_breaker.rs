// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job circuit breaker: rolling-window failure accounting over a
//! three-state machine.
//!
//! The state machine itself is pure (`CircuitBreakerState` in, transition
//! out) so it can be exhaustively unit- and property-tested without a
//! clock or I/O. [`CircuitBreakerRegistry`] wraps it with per-job storage,
//! keyed by job id, guarded by a single mutex — no code path holds this
//! one alongside another component's lock.

use parking_lot::Mutex;
use std::collections::HashMap;
use warden_core::{BreakerState, CircuitBreakerState, FailureClass, JobId};

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub open_duration_ms: i64,
    pub half_open_probe_count: u32,
    pub rolling_window_ms: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration_ms: 30 * 60 * 1000,
            half_open_probe_count: 2,
            rolling_window_ms: 60 * 60 * 1000,
        }
    }
}

/// A state transition worth telling the world about (`circuit:opened` /
/// `circuit:closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Prune failure timestamps older than `now_ms - rolling_window_ms`. Pruning
/// never increases the failure count: it only removes entries, and
/// `failures` is kept in lockstep with `failure_timestamps.len()`.
fn prune(state: &mut CircuitBreakerState, config: &BreakerConfig, now_ms: i64) {
    let cutoff = now_ms - config.rolling_window_ms;
    state.failure_timestamps.retain(|&t| t > cutoff);
    state.failures = state.failure_timestamps.len() as u32;
}

/// `canExecute()`: false in `open` unless the cooldown elapsed, in which
/// case it flips to `half_open` and returns true. Always true otherwise.
pub fn can_execute(
    state: &mut CircuitBreakerState,
    config: &BreakerConfig,
    now_ms: i64,
) -> (bool, Option<Transition>) {
    match state.state {
        BreakerState::Closed | BreakerState::HalfOpen => (true, None),
        BreakerState::Open => {
            let opened_at = state.opened_at_ms.unwrap_or(now_ms);
            if now_ms - opened_at >= config.open_duration_ms {
                let from = state.state;
                state.state = BreakerState::HalfOpen;
                state.half_open_at_ms = Some(now_ms);
                state.successes = 0;
                (true, Some(Transition { from, to: state.state }))
            } else {
                (false, None)
            }
        }
    }
}

/// `recordSuccess()`. In `closed`, resets the rolling window. In
/// `half_open`, counts towards `halfOpenProbeCount`; on reaching it,
/// transitions to `closed` and resets failure accounting.
pub fn record_success(
    state: &mut CircuitBreakerState,
    config: &BreakerConfig,
) -> Option<Transition> {
    match state.state {
        BreakerState::Closed => {
            state.failures = 0;
            state.failure_timestamps.clear();
            state.successes += 1;
            None
        }
        BreakerState::HalfOpen => {
            state.successes += 1;
            if state.successes >= config.half_open_probe_count {
                let from = state.state;
                state.state = BreakerState::Closed;
                state.failures = 0;
                state.successes = 0;
                state.failure_timestamps.clear();
                state.opened_at_ms = None;
                state.half_open_at_ms = None;
                Some(Transition { from, to: state.state })
            } else {
                None
            }
        }
        BreakerState::Open => None,
    }
}

/// `recordFailure(class)`. `Expected` failures are not counted. In
/// `half_open`, any countable failure reopens the circuit. In `closed`,
/// reaching `failureThreshold` within the rolling window opens it.
pub fn record_failure(
    state: &mut CircuitBreakerState,
    config: &BreakerConfig,
    class: FailureClass,
    now_ms: i64,
) -> Option<Transition> {
    if !class.is_countable() {
        return None;
    }

    state.last_failure_at_ms = Some(now_ms);
    state.failure_timestamps.push(now_ms);
    prune(state, config, now_ms);

    match state.state {
        BreakerState::Closed => {
            if state.failures >= config.failure_threshold {
                let from = state.state;
                state.state = BreakerState::Open;
                state.opened_at_ms = Some(now_ms);
                Some(Transition { from, to: state.state })
            } else {
                None
            }
        }
        BreakerState::HalfOpen => {
            let from = state.state;
            state.state = BreakerState::Open;
            state.opened_at_ms = Some(now_ms);
            state.successes = 0;
            Some(Transition { from, to: state.state })
        }
        BreakerState::Open => None,
    }
}

/// Explicit reset to `closed` from any state.
pub fn reset(state: &mut CircuitBreakerState) -> Option<Transition> {
    let from = state.state;
    *state = CircuitBreakerState {
        state: BreakerState::Closed,
        ..Default::default()
    };
    if from == BreakerState::Closed {
        None
    } else {
        Some(Transition {
            from,
            to: BreakerState::Closed,
        })
    }
}

/// Per-job breaker storage, restored from persisted job state at startup.
pub struct CircuitBreakerRegistry {
    config: BreakerConfig,
    states: Mutex<HashMap<String, CircuitBreakerState>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Restore a job's breaker state from its persisted snapshot (the
    /// startup-ordering "breaker state restoration" step).
    pub fn restore_state(&self, job_id: &JobId, state: CircuitBreakerState) {
        self.states.lock().insert(job_id.as_str().to_string(), state);
    }

    pub fn get_state(&self, job_id: &JobId) -> CircuitBreakerState {
        self.states
            .lock()
            .get(job_id.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub fn can_execute(&self, job_id: &JobId, now_ms: i64) -> (bool, Option<Transition>) {
        let mut states = self.states.lock();
        let state = states.entry(job_id.as_str().to_string()).or_default();
        can_execute(state, &self.config, now_ms)
    }

    pub fn record_success(&self, job_id: &JobId) -> Option<Transition> {
        let mut states = self.states.lock();
        let state = states.entry(job_id.as_str().to_string()).or_default();
        record_success(state, &self.config)
    }

    pub fn record_failure(
        &self,
        job_id: &JobId,
        class: FailureClass,
        now_ms: i64,
    ) -> Option<Transition> {
        let mut states = self.states.lock();
        let state = states.entry(job_id.as_str().to_string()).or_default();
        record_failure(state, &self.config, class, now_ms)
    }

    pub fn reset(&self, job_id: &JobId) -> Option<Transition> {
        let mut states = self.states.lock();
        let state = states.entry(job_id.as_str().to_string()).or_default();
        reset(state)
    }
}

#[cfg(test)]
#[path = "circuit_breaker_tests.rs"]
mod tests;
