// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out [`EventSink`] that multiplexes to every registered subscriber
//! (e.g. the daemon's WebSocket broadcaster and its own file logger). Not a
//! process-wide singleton: the Cron Service owns one instance and hands
//! clones of the `Arc<EventBus>` to collaborators that need to emit, same
//! pattern as the per-instance rate limiter and dedupe index.

use parking_lot::Mutex;
use std::sync::Arc;
use warden_core::{Event, EventSink};

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Arc<dyn EventSink>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.subscribers.lock().push(sink);
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: Event) {
        for sink in self.subscribers.lock().iter() {
            sink.emit(event.clone());
        }
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
