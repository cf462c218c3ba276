// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observable event contract emitted by the Cron Service and Tool Firewall.
//! A narrow `emit(topic, payload)` sink owned by the Cron Service fans
//! these out; see `warden-engine::event_bus`.

use crate::id::{JobId, RunUlid};
use crate::job::FailureClass;
use serde::{Deserialize, Serialize};

/// Severity of an [`Event::Alert`]. Only `Critical` is emitted by the core
/// today (admin-tool denial); the variant set is kept open for collaborator
/// alerting tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    JobArmed {
        job_id: JobId,
        next_run_at_ms: i64,
    },
    JobStarted {
        job_id: JobId,
        run_ulid: RunUlid,
    },
    JobCompleted {
        job_id: JobId,
        run_ulid: RunUlid,
        success: bool,
    },
    JobFailed {
        job_id: JobId,
        run_ulid: RunUlid,
        class: FailureClass,
    },
    JobStuck {
        job_id: JobId,
    },
    CircuitOpened {
        job_id: JobId,
        from: crate::job::BreakerState,
    },
    CircuitClosed {
        job_id: JobId,
        from: crate::job::BreakerState,
    },
    /// A safety alert raised outside the job lifecycle, e.g. the firewall's
    /// unconditional admin-tool denial.
    Alert {
        severity: AlertSeverity,
        trigger: String,
        detail: String,
    },
}

/// A narrow fan-out sink for [`Event`]s, owned by the Cron Service and
/// injected into collaborators like the Tool Firewall — never a global
/// hub every component reaches into.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// An event sink that discards everything. Useful as a default in tests and
/// in call sites that don't care about observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: Event) {}
}

/// Phase tag for an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditPhase {
    Intent,
    Result,
    Denied,
    DryRun,
}
