// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use warden_core::AuditPhase;

fn result_entry(seq: u64, intent_seq: u64) -> AuditEntry {
    AuditEntry {
        seq,
        phase: AuditPhase::Result,
        action: "comment".into(),
        target: "t".into(),
        params: serde_json::Value::Null,
        dry_run: false,
        intent_seq: Some(intent_seq),
        result: Some(serde_json::json!({"ok": true})),
        error: None,
        rate_limit_remaining: None,
        prev_hash: "genesis".into(),
        hash: "h".into(),
        timestamp: chrono::Utc::now(),
        job_id: None,
        run_ulid: None,
        template_id: None,
    }
}

#[test]
fn not_a_duplicate_until_completed() {
    let index = DedupeIndex::new();
    assert_eq!(index.is_duplicate("k1"), None);
    index.record_pending("k1", 5);
    assert_eq!(index.is_duplicate("k1"), None);
    index.record_completed("k1");
    assert_eq!(index.is_duplicate("k1"), Some(5));
}

#[test]
fn reconcile_promotes_pending_with_matching_result() {
    let index = DedupeIndex::new();
    index.record_pending("k1", 5);
    index.record_pending("k2", 9);

    let entries = vec![result_entry(6, 5)];
    index.reconcile_with_audit(entries.iter());

    assert_eq!(index.is_duplicate("k1"), Some(5));
    assert_eq!(index.is_duplicate("k2"), None);
}

#[test]
fn reconcile_is_idempotent() {
    let index = DedupeIndex::new();
    index.record_pending("k1", 5);
    let entries = vec![result_entry(6, 5)];
    index.reconcile_with_audit(entries.iter());
    index.reconcile_with_audit(entries.iter());
    assert_eq!(index.is_duplicate("k1"), Some(5));
}
