// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job Runner: given a job and a run token, resolves its
//! template, asks it for the current item set, and for every item whose
//! content hash changed since the last observation opens a sandboxed agent
//! session with the template's policy pre-installed in the firewall.

use crate::template::TemplateRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use warden_core::{
    AbortSignal, Clock, FailureClass, Job, RunRecord, RunStatus, RunUlid, TemplateItem,
};
use warden_firewall::{CircuitBreakerRegistry, DedupeIndex, RateLimiter, ToolExecutor, ToolFirewall};
use warden_storage::{AuditLog, ChangeTrackerStore, JobRegistry, RunContext};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("template '{0}' is not registered")]
    TemplateNotFound(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("registry error: {0}")]
    Registry(#[from] warden_storage::RegistryError),
}

/// Outcome of running a single [`TemplateItem`] through an agent session.
pub struct ItemOutcome {
    pub tool_calls: u32,
}

/// A classified failure from running a single item.
pub struct ItemFailure {
    pub class: FailureClass,
    pub message: String,
    pub tool_calls: u32,
}

/// The agent session contract a template's changed items are run through.
/// The real implementation bridges to an LLM/tool-calling loop; tests
/// substitute an in-memory double. No network calls to a model provider
/// belong in this crate.
#[async_trait]
pub trait AgentSession: Send + Sync {
    async fn run_item(
        &self,
        firewall: &ToolFirewall,
        item: &TemplateItem,
        prompt: &str,
        abort: &AbortSignal,
    ) -> Result<ItemOutcome, ItemFailure>;
}

/// Summary of one full run across every changed item.
pub struct RunSummary {
    pub items_processed: u32,
    pub tool_calls: u32,
    pub success: bool,
    pub error: Option<String>,
    pub failure_class: Option<FailureClass>,
}

/// Drives one run attempt of a job.
pub struct JobRunner {
    templates: TemplateRegistry,
    registry: Arc<JobRegistry>,
    change_trackers: Arc<ChangeTrackerStore>,
    breaker: Arc<CircuitBreakerRegistry>,
    rate_limiter: Arc<RateLimiter>,
    dedupe: Arc<DedupeIndex>,
    audit: Arc<parking_lot::Mutex<AuditLog>>,
    tool_executor: Arc<dyn ToolExecutor>,
    sessions: Arc<dyn AgentSession>,
    events: Arc<dyn warden_core::EventSink>,
    clock: Arc<dyn Clock>,
}

impl JobRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        templates: TemplateRegistry,
        registry: Arc<JobRegistry>,
        change_trackers: Arc<ChangeTrackerStore>,
        breaker: Arc<CircuitBreakerRegistry>,
        rate_limiter: Arc<RateLimiter>,
        dedupe: Arc<DedupeIndex>,
        audit: Arc<parking_lot::Mutex<AuditLog>>,
        tool_executor: Arc<dyn ToolExecutor>,
        sessions: Arc<dyn AgentSession>,
        events: Arc<dyn warden_core::EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            templates,
            registry,
            change_trackers,
            breaker,
            rate_limiter,
            dedupe,
            audit,
            tool_executor,
            sessions,
            events,
            clock,
        }
    }

    /// Run `job` under `run_ulid`, writing a [`RunRecord`] and updating the
    /// job's circuit breaker before returning. Never leaves the audit log's
    /// run-context set past the end of the call, win or lose.
    pub async fn run(
        &self,
        job: &Job,
        run_ulid: RunUlid,
        abort: AbortSignal,
    ) -> Result<RunSummary, RunnerError> {
        let started_at_ms = self.clock.now_ms();
        let template = self
            .templates
            .get(&job.template_id)
            .ok_or_else(|| RunnerError::TemplateNotFound(job.template_id.clone()))?;

        {
            let mut audit = self.audit.lock();
            audit.set_run_context(RunContext {
                job_id: Some(job.id.clone()),
                run_ulid: Some(run_ulid.clone()),
                template_id: Some(job.template_id.clone()),
            });
        }

        let summary = self
            .run_inner(job, &run_ulid, template.as_ref(), &abort)
            .await;

        {
            let mut audit = self.audit.lock();
            audit.clear_run_context();
        }

        let (items_processed, tool_calls, success, error, failure_class) = match &summary {
            Ok(s) => (s.items_processed, s.tool_calls, s.success, s.error.clone(), s.failure_class),
            Err(e) => (0, 0, false, Some(e.to_string()), Some(FailureClass::External)),
        };

        let transition = if success {
            self.breaker.record_success(&job.id)
        } else if let Some(class) = failure_class {
            self.breaker
                .record_failure(&job.id, class, self.clock.now_ms())
        } else {
            None
        };

        // The breaker's in-memory state just advanced (failure count, window
        // timestamps, or a state transition) — mirror it into the durable
        // job record so a restart's `restore_breaker_states()` sees it.
        let breaker_state = self.breaker.get_state(&job.id);
        if let Err(e) = self
            .registry
            .update_job(&job.id, |j| j.circuit_breaker = breaker_state.clone())
        {
            tracing::warn!(job_id = %job.id, error = %e, "failed to persist circuit breaker state");
        }

        if let Some(t) = transition {
            let event = match t.to {
                warden_core::BreakerState::Open => Some(warden_core::Event::CircuitOpened {
                    job_id: job.id.clone(),
                    from: t.from,
                }),
                warden_core::BreakerState::Closed => Some(warden_core::Event::CircuitClosed {
                    job_id: job.id.clone(),
                    from: t.from,
                }),
                warden_core::BreakerState::HalfOpen => None,
            };
            if let Some(event) = event {
                self.events.emit(event);
            }
        }

        let finished_at_ms = self.clock.now_ms();
        let record = RunRecord {
            job_id: job.id.clone(),
            run_ulid: run_ulid.clone(),
            started_at_ms,
            finished_at_ms: Some(finished_at_ms),
            status: if success {
                RunStatus::Success
            } else {
                RunStatus::Failure
            },
            items_processed,
            tool_calls,
            duration_ms: Some(finished_at_ms - started_at_ms),
            error,
        };
        self.registry.append_run_record(&record)?;

        self.events.emit(warden_core::Event::JobCompleted {
            job_id: job.id.clone(),
            run_ulid,
            success,
        });

        summary
    }

    async fn run_inner(
        &self,
        job: &Job,
        run_ulid: &RunUlid,
        template: &dyn crate::template::Template,
        abort: &AbortSignal,
    ) -> Result<RunSummary, RunnerError> {
        let mut tracker = self.change_trackers.load(&job.id)?;

        let items = template
            .resolve_items(&job.config)
            .await
            .map_err(|e| RunnerError::Template(e.to_string()))?;

        let firewall = ToolFirewall::new(
            template.capabilities(),
            template.policy(),
            self.rate_limiter.clone(),
            self.dedupe.clone(),
            self.audit.clone(),
            self.tool_executor.clone(),
            self.events.clone(),
        );

        let mut items_processed = 0u32;
        let mut tool_calls = 0u32;
        let mut failure: Option<(FailureClass, String)> = None;

        for item in &items {
            if abort.is_cancelled() {
                break;
            }
            if !tracker.has_changed(&item.key, &item.hash) {
                continue;
            }

            let prompt = template.build_prompt(item);
            match self.sessions.run_item(&firewall, item, &prompt, abort).await {
                Ok(outcome) => {
                    tool_calls += outcome.tool_calls;
                    items_processed += 1;
                    tracker.update(&item.key, &item.hash);
                }
                Err(item_failure) => {
                    tool_calls += item_failure.tool_calls;
                    failure = Some((item_failure.class, item_failure.message));
                    break;
                }
            }
        }

        self.change_trackers.save(&job.id, &tracker)?;

        match failure {
            None => Ok(RunSummary {
                items_processed,
                tool_calls,
                success: true,
                error: None,
                failure_class: None,
            }),
            Some((class, message)) => {
                self.events.emit(warden_core::Event::JobFailed {
                    job_id: job.id.clone(),
                    run_ulid: run_ulid.clone(),
                    class,
                });
                Ok(RunSummary {
                    items_processed,
                    tool_calls,
                    success: false,
                    error: Some(message),
                    failure_class: Some(class),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
