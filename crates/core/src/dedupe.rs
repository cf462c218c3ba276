// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dedupe entry data type. The stateful index itself lives
//! in `warden-firewall`; this is the plain-old-data shape it persists.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeState {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupeEntry {
    pub key: String,
    pub intent_seq: u64,
    pub state: DedupeState,
}
