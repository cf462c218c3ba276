// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kill switch endpoint.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use warden_core::JobId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Activate,
    Deactivate,
}

#[derive(Debug, Deserialize)]
pub struct KillSwitchRequest {
    pub action: Action,
}

#[derive(Debug, Serialize)]
pub struct KillSwitchResponse {
    pub active: bool,
    pub stopped_jobs: Vec<JobId>,
}

pub async fn kill_switch(
    State(state): State<AppState>,
    Json(req): Json<KillSwitchRequest>,
) -> Result<Json<KillSwitchResponse>, ApiError> {
    match req.action {
        Action::Activate => {
            let stopped = state
                .runtime
                .cron
                .activate_kill_switch()
                .map_err(|e| ApiError::new(warden_core::ErrorKind::Internal, e.to_string()))?;
            Ok(Json(KillSwitchResponse {
                active: true,
                stopped_jobs: stopped,
            }))
        }
        Action::Deactivate => {
            state
                .runtime
                .cron
                .deactivate_kill_switch()
                .map_err(|e| ApiError::new(warden_core::ErrorKind::Internal, e.to_string()))?;
            Ok(Json(KillSwitchResponse {
                active: false,
                stopped_jobs: Vec::new(),
            }))
        }
    }
}
