// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool Firewall: the enforcement funnel every tool call must
//! traverse. Resolves capability, applies policy allow/deny and post-admit
//! constraints, intercepts dry-run writes, consults the rate limiter and
//! dedupe index, then brackets the underlying call with an intent/result
//! audit pair. Never returns to the caller without exactly one of `denied`,
//! `dry_run`, or a matching (`intent`, `result`) audit pair.

use crate::dedupe_index::DedupeIndex;
use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use warden_core::{AbortSignal, AlertSeverity, Capability, ErrorKind, Event, EventSink, Policy, ToolCapabilityResolver, WardenError};
use warden_storage::AuditLog;

/// Executes an admitted tool call against the real (or fake/test) backend.
/// The firewall never touches the tool for denied, dry-run, or deduped
/// calls; this trait is only reached after every gate has passed.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool: &str, params: &Value) -> Result<Value, String>;
}

/// Request shape for a single firewalled tool call.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub tool: String,
    pub params: Value,
    /// Caller-supplied idempotency key. Calls without one are
    /// never deduped.
    pub dedupe_key: Option<String>,
    pub dry_run: bool,
    pub job_id: Option<String>,
    pub abort: Option<AbortSignal>,
}

impl ToolCallRequest {
    pub fn new(tool: impl Into<String>, params: Value) -> Self {
        Self {
            tool: tool.into(),
            params,
            dedupe_key: None,
            dry_run: false,
            job_id: None,
            abort: None,
        }
    }

    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = Some(abort);
        self
    }
}

/// The outcome of an admitted call: which of the three non-error terminal
/// shapes the firewall produced.
#[derive(Debug, Clone)]
pub enum ToolCallOutcome {
    Executed { intent_seq: u64, result: Value },
    DryRun { intent_seq: u64, result: Value },
    /// Short-circuited because `dedupe_key` was already `completed`;
    /// references the original intent, no new audit entry is written.
    Deduped { intent_seq: u64, result: Value },
}

impl ToolCallOutcome {
    pub fn result(&self) -> &Value {
        match self {
            ToolCallOutcome::Executed { result, .. }
            | ToolCallOutcome::DryRun { result, .. }
            | ToolCallOutcome::Deduped { result, .. } => result,
        }
    }
}

fn violates_constraints(policy: &Policy, tool: &str, params: &Value) -> Option<String> {
    let constraints = policy.constraints_for(tool)?;

    if constraints.draft_only {
        let is_draft = params.get("draft").and_then(Value::as_bool).unwrap_or(false);
        if !is_draft {
            return Some(format!("{tool} is draft_only but draft=true was not set"));
        }
    }

    if constraints.labels_only {
        let touches_non_label = params
            .as_object()
            .into_iter()
            .flat_map(|o| o.keys())
            .any(|k| k != "labels" && k != "issue" && k != "pr");
        if touches_non_label {
            return Some(format!("{tool} is labels_only but params touch other fields"));
        }
    }

    if let Some(max_len) = constraints.max_comment_length {
        if let Some(body) = params.get("body").and_then(Value::as_str) {
            if body.len() > max_len {
                return Some(format!("{tool} comment exceeds max_comment_length ({max_len})"));
            }
        }
    }

    if let Some(event) = params.get("event").and_then(Value::as_str) {
        if constraints.denied_events.iter().any(|e| e == event) {
            return Some(format!("{tool} event '{event}' is denied by policy"));
        }
    }

    None
}

/// The enforcement funnel. Holds one template's policy by value,
/// installed at session start per the "Dynamic dispatch on templates" design
/// note — a new `ToolFirewall` is constructed per run/session rather than
/// mutating a shared policy.
pub struct ToolFirewall {
    resolver: Arc<dyn ToolCapabilityResolver>,
    policy: Policy,
    rate_limiter: Arc<RateLimiter>,
    dedupe: Arc<DedupeIndex>,
    audit: Arc<parking_lot::Mutex<AuditLog>>,
    executor: Arc<dyn ToolExecutor>,
    events: Arc<dyn EventSink>,
}

impl ToolFirewall {
    pub fn new(
        resolver: Arc<dyn ToolCapabilityResolver>,
        policy: Policy,
        rate_limiter: Arc<RateLimiter>,
        dedupe: Arc<DedupeIndex>,
        audit: Arc<parking_lot::Mutex<AuditLog>>,
        executor: Arc<dyn ToolExecutor>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            resolver,
            policy,
            rate_limiter,
            dedupe,
            audit,
            executor,
            events,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    fn deny(&self, tool: &str, params: &Value, reason: &str) -> WardenError {
        let mut audit = self.audit.lock();
        let _ = audit.record_denied("tool_call", tool, params.clone(), reason);
        WardenError::new(ErrorKind::PolicyDenied, reason.to_string())
    }

    /// Run one tool call through every gate.
    pub async fn call(&self, req: ToolCallRequest) -> Result<ToolCallOutcome, WardenError> {
        if req.abort.as_ref().is_some_and(AbortSignal::is_cancelled) {
            return Err(self.deny(&req.tool, &req.params, "cancelled"));
        }

        // 1. Resolve capability. An unknown tool has no declared capability
        // and cannot be admitted.
        let Some(capability) = self.resolver.capability(&req.tool) else {
            return Err(self.deny(&req.tool, &req.params, "unknown tool capability"));
        };

        // 2. Admin is always denied, no exceptions.
        if capability == Capability::Admin {
            self.events.emit(Event::Alert {
                severity: AlertSeverity::Critical,
                trigger: "admin_tool_denied".to_string(),
                detail: req.tool.clone(),
            });
            return Err(self.deny(&req.tool, &req.params, "admin capability is always denied"));
        }

        // 3. Explicit deny list.
        if self.policy.is_denied(&req.tool) {
            return Err(self.deny(&req.tool, &req.params, "tool is on the template's deny list"));
        }

        // 4. Must be in the allow list.
        if !self.policy.is_allowed(&req.tool) {
            return Err(self.deny(&req.tool, &req.params, "tool is not in the template's allow list"));
        }

        // Post-admit constraint predicates; a violation is itself a denial.
        if let Some(reason) = violates_constraints(&self.policy, &req.tool, &req.params) {
            return Err(self.deny(&req.tool, &req.params, &reason));
        }

        // 5. Dry-run intercepts write-capability calls before they touch the
        // underlying tool.
        if req.dry_run && capability == Capability::Write {
            let mut audit = self.audit.lock();
            let seq = audit
                .record_dry_run("tool_call", &req.tool, req.params.clone())
                .map_err(|e| WardenError::new(ErrorKind::Internal, e.to_string()))?;
            return Ok(ToolCallOutcome::DryRun {
                intent_seq: seq,
                result: serde_json::json!({"intercepted": true}),
            });
        }

        // 6. Rate limiter.
        if !self.rate_limiter.try_consume(&req.tool, req.job_id.as_deref()) {
            return Err(WardenError::new(
                ErrorKind::RateLimit,
                self.deny(&req.tool, &req.params, "rate limited").message,
            ));
        }

        // 7. Dedupe short-circuit.
        if let Some(key) = &req.dedupe_key {
            if let Some(prior_seq) = self.dedupe.is_duplicate(key) {
                return Ok(ToolCallOutcome::Deduped {
                    intent_seq: prior_seq,
                    result: serde_json::json!({"already_done": true, "intent_seq": prior_seq}),
                });
            }
        }

        // 8. Record intent, mark dedupe pending.
        let intent_seq = {
            let mut audit = self.audit.lock();
            audit
                .record_intent("tool_call", &req.tool, req.params.clone(), req.dry_run)
                .map_err(|e| WardenError::new(ErrorKind::Internal, e.to_string()))?
        };
        if let Some(key) = &req.dedupe_key {
            self.dedupe.record_pending(key, intent_seq);
        }

        if req.abort.as_ref().is_some_and(AbortSignal::is_cancelled) {
            let mut audit = self.audit.lock();
            let _ = audit.record_result(
                intent_seq,
                "tool_call",
                &req.tool,
                Err("aborted".to_string()),
                None,
            );
            return Err(WardenError::new(ErrorKind::Timeout, "aborted"));
        }

        let remaining = self
            .rate_limiter
            .get_remaining(&req.tool, req.job_id.as_deref())
            .global;

        // 9. Execute and seal with a terminal result entry no matter what.
        match self.executor.execute(&req.tool, &req.params).await {
            Ok(result) => {
                {
                    let mut audit = self.audit.lock();
                    let _ = audit.record_result(
                        intent_seq,
                        "tool_call",
                        &req.tool,
                        Ok(result.clone()),
                        Some(remaining as u64),
                    );
                }
                if let Some(key) = &req.dedupe_key {
                    self.dedupe.record_completed(key);
                }
                Ok(ToolCallOutcome::Executed { intent_seq, result })
            }
            Err(error) => {
                let mut audit = self.audit.lock();
                let _ = audit.record_result(
                    intent_seq,
                    "tool_call",
                    &req.tool,
                    Err(error.clone()),
                    Some(remaining as u64),
                );
                Err(WardenError::new(ErrorKind::External, error))
            }
        }
    }
}

#[cfg(test)]
#[path = "tool_tests.rs"]
mod tests;
