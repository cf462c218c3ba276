// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-daemon: wires the scheduler core into a running service and
//! exposes it over HTTP + WebSocket. `wardend`'s `main.rs` is a
//! thin process shell around this library; the library is also the
//! integration-test surface for the workspace's `warden-specs` package.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod runtime;
pub mod state;
pub mod ws;

pub use config::Config;
pub use runtime::{Runtime, RuntimeBuilder, RuntimeError};
pub use state::AppState;
