// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation signal reachable by both the Job Runner and the Tool
//! Firewall. One [`AbortSignal`] is
//! created per run; the kill switch and run-cancellation paths flip it, and
//! any firewall call in flight observes it without needing a callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply-cloned cancellation flag. All clones observe the same
/// underlying state.
#[derive(Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled_and_observes_cancel_through_clones() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        assert!(!signal.is_cancelled());
        clone.cancel();
        assert!(signal.is_cancelled());
    }
}
