// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps a caller-supplied dedupe key to `(intentSeq, state)`.

use parking_lot::Mutex;
use std::collections::HashMap;
use warden_core::{AuditPhase, DedupeEntry, DedupeState};
use warden_storage::AuditEntry;

/// Per-instance dedupe index; never a process-wide singleton.
#[derive(Default)]
pub struct DedupeIndex {
    entries: Mutex<HashMap<String, DedupeEntry>>,
}

impl DedupeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the prior intent seq only when the key is in `completed`
    /// state.
    pub fn is_duplicate(&self, key: &str) -> Option<u64> {
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(e) if e.state == DedupeState::Completed => Some(e.intent_seq),
            _ => None,
        }
    }

    pub fn record_pending(&self, key: &str, intent_seq: u64) {
        self.entries.lock().insert(
            key.to_string(),
            DedupeEntry {
                key: key.to_string(),
                intent_seq,
                state: DedupeState::Pending,
            },
        );
    }

    pub fn record_completed(&self, key: &str) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.state = DedupeState::Completed;
        }
    }

    /// Crash recovery: a `pending` entry whose intent never saw a result is
    /// promoted to `completed` iff the audit log contains a terminal phase
    /// for its intent seq; otherwise it's dropped so a retry isn't
    /// incorrectly short-circuited.
    pub fn reconcile_with_audit<'a>(&self, audit_entries: impl Iterator<Item = &'a AuditEntry>) {
        let mut terminal_intent_seqs = std::collections::HashSet::new();
        for entry in audit_entries {
            if entry.phase == AuditPhase::Result {
                if let Some(seq) = entry.intent_seq {
                    terminal_intent_seqs.insert(seq);
                }
            }
        }

        let mut entries = self.entries.lock();
        entries.retain(|_, entry| {
            if entry.state == DedupeState::Completed {
                return true;
            }
            if terminal_intent_seqs.contains(&entry.intent_seq) {
                entry.state = DedupeState::Completed;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
#[path = "dedupe_index_tests.rs"]
mod tests;
