// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injectable time source. Every place the core reads wall-clock time goes
//! through this trait so tests can run under logical time instead of real
//! sleeps.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current time, expressed as milliseconds since the Unix
/// epoch. Implementors must be cheap to call and safe to share across
/// threads.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// A controllable clock for deterministic tests. Starts at an arbitrary
/// fixed instant and only advances when explicitly told to.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<AtomicI64>,
    // Guards multi-step advances so concurrent test helpers can't interleave
    // a read-modify-write race on the atomic.
    advance_lock: Arc<Mutex<()>>,
}

impl FakeClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            inner: Arc::new(AtomicI64::new(start_ms)),
            advance_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        let _guard = self.advance_lock.lock();
        self.inner.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set_ms(&self, ms: i64) {
        let _guard = self.advance_lock.lock();
        self.inner.store(ms, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.inner.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
