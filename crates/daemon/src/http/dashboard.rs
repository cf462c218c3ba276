// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregate status snapshot, `GET /api/dashboard/overview` — a natural
//! extension of the job/breaker/kill-switch state the other endpoints
//! already expose piecemeal, collapsed into one read-only read.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use warden_core::{BreakerState, JobStatus};

#[derive(Debug, Serialize)]
pub struct JobCounts {
    pub total: usize,
    pub enabled: usize,
    pub armed: usize,
    pub running: usize,
    pub disabled: usize,
    pub stuck: usize,
}

#[derive(Debug, Serialize)]
pub struct BreakerCounts {
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
}

#[derive(Debug, Serialize)]
pub struct AuditHealth {
    pub valid: bool,
    pub broken_at: Option<u64>,
    pub entry_count: u64,
}

#[derive(Debug, Serialize)]
pub struct WorkerPoolConfig {
    pub lane_depth: usize,
    pub lane_concurrency: usize,
}

#[derive(Debug, Serialize)]
pub struct EventStreamHealth {
    pub lagged_frames: u64,
}

#[derive(Debug, Serialize)]
pub struct DashboardOverview {
    pub jobs: JobCounts,
    pub breakers: BreakerCounts,
    pub kill_switch_active: bool,
    pub audit: AuditHealth,
    pub worker_pool: WorkerPoolConfig,
    pub events: EventStreamHealth,
}

pub async fn overview(State(state): State<AppState>) -> Result<Json<DashboardOverview>, ApiError> {
    let jobs = state.runtime.registry.get_jobs();

    let count_of = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
    let job_counts = JobCounts {
        total: jobs.len(),
        enabled: count_of(JobStatus::Enabled),
        armed: count_of(JobStatus::Armed),
        running: count_of(JobStatus::Running),
        disabled: count_of(JobStatus::Disabled),
        stuck: count_of(JobStatus::Stuck),
    };

    let mut breaker_counts = BreakerCounts {
        closed: 0,
        open: 0,
        half_open: 0,
    };
    for job in &jobs {
        match state.runtime.breaker.get_state(&job.id).state {
            BreakerState::Closed => breaker_counts.closed += 1,
            BreakerState::Open => breaker_counts.open += 1,
            BreakerState::HalfOpen => breaker_counts.half_open += 1,
        }
    }

    let verification = state
        .runtime
        .audit
        .lock()
        .verify_chain()
        .map_err(|e| ApiError::new(warden_core::ErrorKind::Internal, e.to_string()))?;

    Ok(Json(DashboardOverview {
        jobs: job_counts,
        breakers: breaker_counts,
        kill_switch_active: state.runtime.registry.is_kill_switch_active(),
        audit: AuditHealth {
            valid: verification.valid,
            broken_at: verification.broken_at,
            entry_count: verification.entry_count,
        },
        worker_pool: WorkerPoolConfig {
            lane_depth: state.config.worker_lane_depth,
            lane_concurrency: state.config.worker_lane_concurrency,
        },
        events: EventStreamHealth {
            lagged_frames: state.broadcast.lagged_count(),
        },
    }))
}
