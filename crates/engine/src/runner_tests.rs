// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::template::{Template, TemplateError};
use async_trait::async_trait;
use std::collections::HashMap as StdHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;
use warden_core::{
    CapabilityTable, Capability, FakeClock, Job, JobConfig, JobId, ConcurrencyPolicy, NoopEventSink,
    Policy, Schedule,
};
use warden_firewall::{DedupeIndex, RateLimitConfig, RateLimiter};

struct TwoItemTemplate;

#[async_trait]
impl Template for TwoItemTemplate {
    fn template_id(&self) -> &str {
        "pipeline-template"
    }

    async fn resolve_items(
        &self,
        _job_config: &serde_json::Value,
    ) -> Result<Vec<TemplateItem>, TemplateError> {
        Ok(vec![
            TemplateItem {
                key: "issue-1".into(),
                hash: "h1".into(),
                data: serde_json::json!({}),
            },
            TemplateItem {
                key: "issue-2".into(),
                hash: "h2".into(),
                data: serde_json::json!({}),
            },
        ])
    }

    fn build_prompt(&self, item: &TemplateItem) -> String {
        format!("handle {}", item.key)
    }

    fn canonical_hash_fields(&self) -> &[&str] {
        &["title"]
    }

    fn policy(&self) -> Policy {
        Policy {
            template_id: "pipeline-template".into(),
            allow: vec!["comment".into()],
            deny: vec![],
            constraints: StdHashMap::new(),
        }
    }

    fn capabilities(&self) -> Arc<dyn warden_core::ToolCapabilityResolver> {
        Arc::new(CapabilityTable::new().with("comment", Capability::Write))
    }
}

struct CountingSession {
    invocations: AtomicUsize,
}

#[async_trait]
impl AgentSession for CountingSession {
    async fn run_item(
        &self,
        firewall: &ToolFirewall,
        item: &TemplateItem,
        _prompt: &str,
        abort: &AbortSignal,
    ) -> Result<ItemOutcome, ItemFailure> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let outcome = firewall
            .call(warden_firewall::ToolCallRequest::new(
                "comment",
                serde_json::json!({"body": format!("re: {}", item.key)}),
            ))
            .await;
        assert!(!abort.is_cancelled());
        match outcome {
            Ok(_) => Ok(ItemOutcome { tool_calls: 1 }),
            Err(e) => Err(ItemFailure {
                class: FailureClass::External,
                message: e.to_string(),
                tool_calls: 1,
            }),
        }
    }
}

struct AlwaysFailsSession;

#[async_trait]
impl AgentSession for AlwaysFailsSession {
    async fn run_item(
        &self,
        _firewall: &ToolFirewall,
        _item: &TemplateItem,
        _prompt: &str,
        _abort: &AbortSignal,
    ) -> Result<ItemOutcome, ItemFailure> {
        Err(ItemFailure {
            class: FailureClass::External,
            message: "boom".into(),
            tool_calls: 0,
        })
    }
}

struct EchoToolExecutor;

#[async_trait]
impl ToolExecutor for EchoToolExecutor {
    async fn execute(&self, _tool: &str, params: &serde_json::Value) -> Result<serde_json::Value, String> {
        Ok(params.clone())
    }
}

fn sample_job() -> Job {
    Job::new(
        JobConfig {
            id: JobId::new("pipeline-1"),
            name: "pipeline-1".into(),
            template_id: "pipeline-template".into(),
            schedule: Schedule::Every { interval_ms: 60_000 },
            concurrency_policy: ConcurrencyPolicy::Skip,
            one_shot: false,
            config: serde_json::json!({}),
        },
        0,
    )
}

fn make_runner(dir: &std::path::Path) -> JobRunner {
    make_runner_with_session(
        dir,
        Arc::new(CountingSession {
            invocations: AtomicUsize::new(0),
        }),
    )
}

fn make_runner_with_session(dir: &std::path::Path, sessions: Arc<dyn AgentSession>) -> JobRunner {
    let mut templates = TemplateRegistry::new();
    templates.register(Arc::new(TwoItemTemplate));

    let registry = Arc::new(JobRegistry::open(dir).unwrap());
    let change_trackers = Arc::new(ChangeTrackerStore::open(dir).unwrap());
    let breaker = Arc::new(CircuitBreakerRegistry::new(Default::default()));
    let clock = Arc::new(FakeClock::new(1_000));
    let rate_limiter = Arc::new(RateLimiter::new(
        clock.clone(),
        RateLimitConfig::default(),
        RateLimitConfig::default(),
    ));
    let dedupe = Arc::new(DedupeIndex::new());
    let audit = Arc::new(parking_lot::Mutex::new(
        AuditLog::open(&dir.join("audit.jsonl")).unwrap(),
    ));

    JobRunner::new(
        templates,
        registry,
        change_trackers,
        breaker,
        rate_limiter,
        dedupe,
        audit,
        Arc::new(EchoToolExecutor),
        sessions,
        Arc::new(NoopEventSink),
        clock,
    )
}

#[tokio::test]
async fn full_pipeline_processes_every_changed_item() {
    let dir = tempdir().unwrap();
    let runner = make_runner(dir.path());
    let job = sample_job();

    let summary = runner
        .run(&job, RunUlid::new("run-1"), AbortSignal::new())
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(summary.items_processed, 2);
    assert_eq!(summary.tool_calls, 2);

    let records = runner
        .registry
        .read_run_records(&JobId::new("pipeline-1"), 0, 10)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RunStatus::Success);
}

#[tokio::test]
async fn second_run_skips_unchanged_items() {
    let dir = tempdir().unwrap();
    let runner = make_runner(dir.path());
    let job = sample_job();

    runner
        .run(&job, RunUlid::new("run-1"), AbortSignal::new())
        .await
        .unwrap();
    let second = runner
        .run(&job, RunUlid::new("run-2"), AbortSignal::new())
        .await
        .unwrap();

    assert_eq!(second.items_processed, 0);
    assert!(second.success);
}

#[tokio::test]
async fn unregistered_template_fails_fast() {
    let dir = tempdir().unwrap();
    let runner = make_runner(dir.path());
    let mut job = sample_job();
    job.template_id = "missing".into();

    let err = runner
        .run(&job, RunUlid::new("run-1"), AbortSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::TemplateNotFound(id) if id == "missing"));
}

#[tokio::test]
async fn a_failed_run_persists_the_breaker_state_into_the_job_record() {
    let dir = tempdir().unwrap();
    let runner = make_runner_with_session(dir.path(), Arc::new(AlwaysFailsSession));
    let job = sample_job();
    runner.registry.add_job(job.clone()).unwrap();

    let summary = runner
        .run(&job, RunUlid::new("run-1"), AbortSignal::new())
        .await
        .unwrap();
    assert!(!summary.success);

    let live = runner.breaker.get_state(&job.id);
    assert_eq!(live.failures, 1);

    let stored = runner.registry.get_job(&job.id).unwrap();
    assert_eq!(stored.circuit_breaker.failures, 1);
    assert_eq!(stored.circuit_breaker.state, live.state);
}
