// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::rate_limiter::RateLimitConfig;
use parking_lot::Mutex as PLMutex;
use std::collections::HashMap as StdHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::tempdir;
use warden_core::{CapabilityTable, FakeClock};

#[derive(Default)]
struct FakeExecutor {
    calls: AtomicU32,
    responses: PLMutex<StdHashMap<String, Result<Value, String>>>,
}

impl FakeExecutor {
    fn with(tool: &str, response: Result<Value, String>) -> Self {
        let exec = Self::default();
        exec.responses.lock().insert(tool.to_string(), response);
        exec
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolExecutor for FakeExecutor {
    async fn execute(&self, tool: &str, _params: &Value) -> Result<Value, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .get(tool)
            .cloned()
            .unwrap_or(Ok(serde_json::json!({"ok": true})))
    }
}

#[derive(Default)]
struct RecordingSink {
    events: PLMutex<Vec<Event>>,
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

fn policy() -> Policy {
    Policy {
        template_id: "t".into(),
        allow: vec!["comment".into(), "delete_repo_admin".into()],
        deny: vec!["force_push".into()],
        constraints: StdHashMap::new(),
    }
}

fn resolver() -> Arc<dyn ToolCapabilityResolver> {
    Arc::new(
        CapabilityTable::new()
            .with("comment", Capability::Write)
            .with("read_issue", Capability::Read)
            .with("force_push", Capability::Write)
            .with("delete_repo_admin", Capability::Admin),
    )
}

fn firewall(
    policy: Policy,
    executor: Arc<dyn ToolExecutor>,
    events: Arc<dyn EventSink>,
) -> (ToolFirewall, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let audit = Arc::new(PLMutex::new(AuditLog::open(&dir.path().join("audit.jsonl")).unwrap()));
    let rate_limiter = Arc::new(RateLimiter::new(
        Arc::new(FakeClock::new(0)),
        RateLimitConfig { capacity: 2, window_ms: 60_000 },
        RateLimitConfig { capacity: 2, window_ms: 60_000 },
    ));
    let dedupe = Arc::new(DedupeIndex::new());
    let fw = ToolFirewall::new(resolver(), policy, rate_limiter, dedupe, audit, executor, events);
    (fw, dir)
}

#[tokio::test]
async fn admin_tool_is_always_denied_and_alerts() {
    let executor = Arc::new(FakeExecutor::default());
    let events = Arc::new(RecordingSink::default());
    let (fw, _dir) = firewall(policy(), executor.clone(), events.clone());

    let result = fw.call(ToolCallRequest::new("delete_repo_admin", serde_json::json!({}))).await;
    assert!(matches!(result, Err(e) if e.kind == ErrorKind::PolicyDenied));

    assert_eq!(executor.call_count(), 0);
    assert_eq!(events.events.lock().len(), 1);
    match &events.events.lock()[0] {
        Event::Alert { severity, trigger, .. } => {
            assert_eq!(*severity, AlertSeverity::Critical);
            assert_eq!(trigger, "admin_tool_denied");
        }
        _ => panic!("expected an alert event"),
    }
}

#[tokio::test]
async fn deny_list_blocks_before_reaching_executor() {
    let executor = Arc::new(FakeExecutor::default());
    let events: Arc<dyn EventSink> = Arc::new(RecordingSink::default());
    let (fw, _dir) = firewall(policy(), executor.clone(), events);

    let result = fw.call(ToolCallRequest::new("force_push", serde_json::json!({}))).await;
    assert!(matches!(result, Err(e) if e.kind == ErrorKind::PolicyDenied));
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn tool_not_in_allow_list_is_denied() {
    let executor = Arc::new(FakeExecutor::default());
    let events: Arc<dyn EventSink> = Arc::new(RecordingSink::default());
    let (fw, _dir) = firewall(policy(), executor.clone(), events);

    let result = fw.call(ToolCallRequest::new("read_issue", serde_json::json!({}))).await;
    assert!(matches!(result, Err(e) if e.kind == ErrorKind::PolicyDenied));
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn dry_run_intercepts_write_tools_without_calling_executor() {
    let executor = Arc::new(FakeExecutor::default());
    let events: Arc<dyn EventSink> = Arc::new(RecordingSink::default());
    let (fw, _dir) = firewall(policy(), executor.clone(), events);

    let result = fw
        .call(ToolCallRequest::new("comment", serde_json::json!({"body": "hi"})).with_dry_run(true))
        .await
        .unwrap();
    assert!(matches!(result, ToolCallOutcome::DryRun { .. }));
    assert_eq!(result.result(), &serde_json::json!({"intercepted": true}));
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn successful_call_produces_intent_and_result_audit_pair() {
    let executor = Arc::new(FakeExecutor::default());
    let events: Arc<dyn EventSink> = Arc::new(RecordingSink::default());
    let (fw, dir) = firewall(policy(), executor.clone(), events);

    let outcome = fw
        .call(ToolCallRequest::new("comment", serde_json::json!({"body": "hi"})))
        .await
        .unwrap();
    let ToolCallOutcome::Executed { intent_seq, .. } = outcome else {
        panic!("expected Executed");
    };
    assert_eq!(executor.call_count(), 1);

    let audit = AuditLog::open(&dir.path().join("audit.jsonl")).unwrap();
    let verification = audit.verify_chain().unwrap();
    assert!(verification.valid);
    assert_eq!(audit.seq(), 2); // intent + result
    assert_eq!(intent_seq, 1);
}

#[tokio::test]
async fn max_comment_length_constraint_denies_oversized_body() {
    let mut p = policy();
    p.constraints.insert(
        "comment".into(),
        warden_core::ToolConstraints {
            max_comment_length: Some(4),
            ..Default::default()
        },
    );
    let executor = Arc::new(FakeExecutor::default());
    let events: Arc<dyn EventSink> = Arc::new(RecordingSink::default());
    let (fw, _dir) = firewall(p, executor.clone(), events);

    let result = fw
        .call(ToolCallRequest::new("comment", serde_json::json!({"body": "way too long"})))
        .await;
    assert!(matches!(result, Err(e) if e.kind == ErrorKind::PolicyDenied));
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn rate_limit_denies_after_capacity_exhausted() {
    let executor = Arc::new(FakeExecutor::default());
    let events: Arc<dyn EventSink> = Arc::new(RecordingSink::default());
    let (fw, _dir) = firewall(policy(), executor.clone(), events);

    for _ in 0..2 {
        fw.call(ToolCallRequest::new("comment", serde_json::json!({"body": "hi"})))
            .await
            .unwrap();
    }
    let result = fw
        .call(ToolCallRequest::new("comment", serde_json::json!({"body": "hi"})))
        .await;
    assert!(matches!(result, Err(e) if e.kind == ErrorKind::RateLimit));
    assert_eq!(executor.call_count(), 2);
}

#[tokio::test]
async fn dedupe_short_circuits_completed_key_without_reexecuting() {
    let executor = Arc::new(FakeExecutor::default());
    let events: Arc<dyn EventSink> = Arc::new(RecordingSink::default());
    let (fw, _dir) = firewall(policy(), executor.clone(), events);

    let first = fw
        .call(
            ToolCallRequest::new("comment", serde_json::json!({"body": "hi"}))
                .with_dedupe_key("issue-1-comment"),
        )
        .await
        .unwrap();
    let ToolCallOutcome::Executed { intent_seq, .. } = first else {
        panic!("expected Executed");
    };

    let second = fw
        .call(
            ToolCallRequest::new("comment", serde_json::json!({"body": "hi"}))
                .with_dedupe_key("issue-1-comment"),
        )
        .await
        .unwrap();
    match second {
        ToolCallOutcome::Deduped { intent_seq: prior, .. } => assert_eq!(prior, intent_seq),
        _ => panic!("expected Deduped"),
    }
    assert_eq!(executor.call_count(), 1);
}

#[tokio::test]
async fn executor_error_still_seals_a_terminal_result_entry() {
    let executor: Arc<dyn ToolExecutor> =
        Arc::new(FakeExecutor::with("comment", Err("upstream 500".to_string())));
    let events: Arc<dyn EventSink> = Arc::new(RecordingSink::default());
    let (fw, dir) = firewall(policy(), executor, events);

    let result = fw
        .call(ToolCallRequest::new("comment", serde_json::json!({"body": "hi"})))
        .await;
    assert!(matches!(result, Err(e) if e.kind == ErrorKind::External));

    let audit = AuditLog::open(&dir.path().join("audit.jsonl")).unwrap();
    assert_eq!(audit.seq(), 2);
    assert!(audit.verify_chain().unwrap().valid);
}

#[tokio::test]
async fn already_cancelled_signal_denies_before_any_audit_intent() {
    let executor = Arc::new(FakeExecutor::default());
    let events: Arc<dyn EventSink> = Arc::new(RecordingSink::default());
    let (fw, dir) = firewall(policy(), executor.clone(), events);

    let abort = warden_core::AbortSignal::new();
    abort.cancel();
    let result = fw
        .call(ToolCallRequest::new("comment", serde_json::json!({"body": "hi"})).with_abort(abort))
        .await;
    assert!(matches!(result, Err(e) if e.kind == ErrorKind::PolicyDenied));
    assert_eq!(executor.call_count(), 0);

    let audit = AuditLog::open(&dir.path().join("audit.jsonl")).unwrap();
    assert_eq!(audit.seq(), 1); // a single `denied` entry, no intent
}
