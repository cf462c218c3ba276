// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the core components (registry, audit log, breaker, rate limiter,
//! dedupe index, worker pool, cron service) into a running instance. This
//! is the daemon's composition root; nothing here is a process-wide
//! singleton, every component is constructed once and handed around as an
//! `Arc`.
//!
//! The daemon ships with no built-in templates and a [`NullToolExecutor`] /
//! [`NullAgentSession`] pair: the Job Runner's agent session and the
//! code-hosting tool backend are external collaborators out of scope
//! here. An embedder registers real templates via
//! [`Runtime::builder`] before calling [`Runtime::start`]; `wardend` as
//! shipped here is the bare scheduler shell with a fully functional HTTP
//! surface over template-less jobs.

use crate::config::Config;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use warden_core::{
    AbortSignal, Clock, FailureClass, Job, LastStatus, RunUlid, SystemClock, UlidIdGen,
};
use warden_engine::{
    AgentSession, CronConfig, CronError, CronService, ItemFailure, ItemOutcome, JobExecutor,
    JobRunner, Lane, TemplateItem, TemplateRegistry, WorkerPool,
};
use warden_firewall::{CircuitBreakerRegistry, DedupeIndex, RateLimitConfig, RateLimiter, ToolExecutor, ToolFirewall};
use warden_storage::{AuditLog, ChangeTrackerStore, JobRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("audit error: {0}")]
    Audit(#[from] warden_storage::AuditError),
    #[error("cron error: {0}")]
    Cron(#[from] CronError),
    #[error(
        "audit log integrity check failed at entry {0}: refusing to start"
    )]
    AuditChainBroken(u64),
}

/// No tools are registered without an embedder; calling any tool fails
/// with a clear message rather than panicking or silently succeeding.
pub struct NullToolExecutor;

#[async_trait]
impl ToolExecutor for NullToolExecutor {
    async fn execute(&self, tool: &str, _params: &Value) -> Result<Value, String> {
        Err(format!("no tool executor configured for '{tool}'"))
    }
}

/// An agent session that processes zero items; only reachable if a
/// template is registered without a corresponding session implementation.
pub struct NullAgentSession;

#[async_trait]
impl AgentSession for NullAgentSession {
    async fn run_item(
        &self,
        _firewall: &ToolFirewall,
        _item: &TemplateItem,
        _prompt: &str,
        _abort: &AbortSignal,
    ) -> Result<ItemOutcome, ItemFailure> {
        Err(ItemFailure {
            class: FailureClass::External,
            message: "no agent session configured".to_string(),
            tool_calls: 0,
        })
    }
}

/// Bridges the Cron Service's executor contract to the Job Runner: runs
/// the job, then releases the CAS token itself so the Cron Service never
/// has to.
struct JobRunnerExecutor {
    runner: Arc<JobRunner>,
    registry: Arc<JobRegistry>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl JobExecutor for JobRunnerExecutor {
    async fn execute(&self, job: Job, run_ulid: RunUlid, abort: AbortSignal) -> Result<(), String> {
        let job_id = job.id.clone();
        let result = self.runner.run(&job, run_ulid.clone(), abort).await;
        let now = self.clock.now_ms();
        let last_status = match &result {
            Ok(summary) if summary.success => LastStatus::Success,
            Ok(_) => LastStatus::Failure,
            Err(_) => LastStatus::Failure,
        };
        let _ = self.registry.release_run(&job_id, &run_ulid, last_status, now);
        result.map(|_| ()).map_err(|e| e.to_string())
    }
}

/// Every running component, held for the lifetime of the daemon process.
#[derive(Clone)]
pub struct Runtime {
    pub registry: Arc<JobRegistry>,
    pub audit: Arc<parking_lot::Mutex<AuditLog>>,
    pub breaker: Arc<CircuitBreakerRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub dedupe: Arc<DedupeIndex>,
    pub worker_pool: Arc<WorkerPool>,
    pub events: Arc<warden_engine::EventBus>,
    pub cron: Arc<CronService>,
    pub clock: Arc<dyn Clock>,
}

/// Builds a [`Runtime`], letting an embedder register templates and swap
/// the tool executor / agent session before `start()`.
pub struct RuntimeBuilder {
    config: Config,
    templates: TemplateRegistry,
    tool_executor: Arc<dyn ToolExecutor>,
    agent_session: Arc<dyn AgentSession>,
    clock: Arc<dyn Clock>,
}

impl RuntimeBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            templates: TemplateRegistry::new(),
            tool_executor: Arc::new(NullToolExecutor),
            agent_session: Arc::new(NullAgentSession),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_tool_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.tool_executor = executor;
        self
    }

    pub fn with_agent_session(mut self, session: Arc<dyn AgentSession>) -> Self {
        self.agent_session = session;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build every component and run the startup ordering: audit chain
    /// verification -> registry load -> stuck-job recovery -> breaker
    /// state restoration -> arming sweep -> ticks begin. Registry load
    /// happens implicitly in `JobRegistry::open`; everything else is
    /// explicit here or inside `CronService::start`.
    pub fn build_and_start(self) -> Result<Runtime, RuntimeError> {
        std::fs::create_dir_all(&self.config.data_dir)?;

        // 1. Audit chain verification. A broken chain is fatal: the
        // service refuses to start rather than keep appending to a log an
        // operator can no longer trust.
        let audit_log = AuditLog::open_rotating(
            &self.config.audit_log_path(),
            self.config.audit_rotate_bytes,
        )?;
        let verification = audit_log.verify_chain()?;
        if !verification.valid {
            return Err(RuntimeError::AuditChainBroken(
                verification.broken_at.unwrap_or(0),
            ));
        }
        let audit = Arc::new(parking_lot::Mutex::new(audit_log));

        // 2. Registry load (already happened via JobRegistry::open below,
        // which reads the snapshot synchronously).
        let registry = Arc::new(JobRegistry::open(&self.config.registry_dir())?);
        let change_trackers = Arc::new(ChangeTrackerStore::open(&self.config.registry_dir())?);

        let breaker = Arc::new(CircuitBreakerRegistry::new(self.config.breaker));
        let rate_limiter = Arc::new(RateLimiter::new(
            self.clock.clone(),
            RateLimitConfig::default(),
            RateLimitConfig::default(),
        ));
        let dedupe = Arc::new(DedupeIndex::new());
        let worker_pool = Arc::new(WorkerPool::new(
            self.config.worker_lane_depth,
            self.config.worker_lane_concurrency,
        ));
        let events = Arc::new(warden_engine::EventBus::new());
        let id_gen = Arc::new(UlidIdGen);

        let cron = CronService::new(
            registry.clone(),
            breaker.clone(),
            worker_pool.clone(),
            events.clone(),
            self.clock.clone(),
            id_gen,
            CronConfig {
                tick_interval_ms: self.config.tick_interval_ms,
                stuck_job_timeout_ms: self.config.stuck_job_timeout_ms,
            },
        );

        let runner = Arc::new(JobRunner::new(
            self.templates,
            registry.clone(),
            change_trackers,
            breaker.clone(),
            rate_limiter.clone(),
            dedupe.clone(),
            audit.clone(),
            self.tool_executor,
            self.agent_session,
            events.clone(),
            self.clock.clone(),
        ));

        cron.set_executor(Arc::new(JobRunnerExecutor {
            runner,
            registry: registry.clone(),
            clock: self.clock.clone(),
        }));

        // 3-5. Stuck-job recovery, breaker restoration, arming sweep, then
        // ticks begin — all performed by `CronService::start`.
        cron.start()?;

        Ok(Runtime {
            registry,
            audit,
            breaker,
            rate_limiter,
            dedupe,
            worker_pool,
            events,
            cron,
            clock: self.clock,
        })
    }
}
