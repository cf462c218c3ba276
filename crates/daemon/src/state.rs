// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared axum state. One instance, cloned (cheaply, everything inside is
//! an `Arc`) into every handler via `State<AppState>`.

use crate::config::Config;
use crate::runtime::Runtime;
use crate::ws::{BroadcastSink, ConnectionTracker};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub runtime: Runtime,
    pub broadcast: Arc<BroadcastSink>,
    pub connections: Arc<ConnectionTracker>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        runtime: Runtime,
        broadcast: Arc<BroadcastSink>,
        connections: Arc<ConnectionTracker>,
    ) -> Self {
        Self {
            config,
            runtime,
            broadcast,
            connections,
        }
    }
}
