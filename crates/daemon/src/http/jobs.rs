// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job CRUD, manual trigger, and run-log endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use warden_core::{ConcurrencyPolicy, IdGen, Job, JobConfig, JobId, RunRecord, Schedule, UlidIdGen};
use warden_engine::CronError;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    pub template_id: String,
    pub schedule: Schedule,
    #[serde(default)]
    pub concurrency_policy: Option<ConcurrencyPolicy>,
    #[serde(default)]
    pub one_shot: bool,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
}

fn default_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(axum::http::StatusCode, Json<Job>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    if req.template_id.trim().is_empty() {
        return Err(ApiError::validation("template_id must not be empty"));
    }

    let id = UlidIdGen.next_job_id();
    let config = JobConfig {
        id,
        name: req.name,
        template_id: req.template_id,
        schedule: req.schedule,
        concurrency_policy: req.concurrency_policy.unwrap_or(ConcurrencyPolicy::Skip),
        one_shot: req.one_shot,
        config: req.config,
    };

    let job = state.runtime.cron.create_job(config).map_err(cron_err)?;
    Ok((axum::http::StatusCode::CREATED, Json(job)))
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.runtime.registry.get_jobs())
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub name: Option<String>,
    pub schedule: Option<Schedule>,
    pub enabled: Option<bool>,
    pub concurrency_policy: Option<ConcurrencyPolicy>,
    pub config: Option<serde_json::Value>,
}

pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<Job>, ApiError> {
    let job_id = JobId::new(id);
    let now = state.runtime.clock.now_ms();

    let found = state
        .runtime
        .cron
        .update_job(&job_id, |j| {
            if let Some(name) = req.name {
                j.name = name;
            }
            if let Some(schedule) = req.schedule {
                j.schedule = schedule;
            }
            if let Some(enabled) = req.enabled {
                j.enabled = enabled;
            }
            if let Some(policy) = req.concurrency_policy {
                j.concurrency_policy = policy;
            }
            if let Some(config) = req.config {
                j.config = config;
            }
            j.updated_at_ms = now;
        })
        .map_err(cron_err)?;

    if !found {
        return Err(ApiError::not_found(format!("job '{}' not found", job_id.as_str())));
    }

    let job = state
        .runtime
        .registry
        .get_job(&job_id)
        .ok_or_else(|| ApiError::not_found(format!("job '{}' not found", job_id.as_str())))?;
    Ok(Json(job))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<axum::http::StatusCode, ApiError> {
    let job_id = JobId::new(id);
    let deleted = state.runtime.cron.delete_job(&job_id).map_err(cron_err)?;
    if !deleted {
        return Err(ApiError::not_found(format!("job '{}' not found", job_id.as_str())));
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub triggered: bool,
}

pub async fn trigger_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let job_id = JobId::new(id);
    if state.runtime.registry.get_job(&job_id).is_none() {
        return Err(ApiError::not_found(format!("job '{}' not found", job_id.as_str())));
    }
    let triggered = state.runtime.cron.trigger_job(&job_id);
    Ok(Json(TriggerResponse { triggered }))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

pub async fn job_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<RunRecord>>, ApiError> {
    let job_id = JobId::new(id);
    if state.runtime.registry.get_job(&job_id).is_none() {
        return Err(ApiError::not_found(format!("job '{}' not found", job_id.as_str())));
    }
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(50);
    let records = state
        .runtime
        .registry
        .read_run_records(&job_id, offset, limit)
        .map_err(|e| ApiError::new(warden_core::ErrorKind::Internal, e.to_string()))?;
    Ok(Json(records))
}

fn cron_err(e: CronError) -> ApiError {
    match e {
        CronError::NotFound(id) => ApiError::not_found(format!("job '{id}' not found")),
        other => ApiError::new(warden_core::ErrorKind::Internal, other.to_string()),
    }
}
