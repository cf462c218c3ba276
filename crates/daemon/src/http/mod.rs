// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: job CRUD, manual trigger, run logs, kill switch,
//! and the dashboard overview. Every route other than the WebSocket upgrade
//! sits behind the bearer-token auth middleware.

pub mod dashboard;
pub mod jobs;
pub mod kill_switch;

use crate::auth::require_bearer_token;
use crate::error::route_not_found;
use crate::state::AppState;
use crate::ws;
use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete router. Bearer auth wraps every route below this
/// layer; the WebSocket upgrade itself is unauthenticated over the socket
/// handshake (the collaborator that fronts this daemon is expected to
/// terminate TLS and forward a trusted connection) but still respects the
/// per-IP connection cap.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/cron/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route(
            "/cron/jobs/:id",
            patch(jobs::update_job).delete(jobs::delete_job),
        )
        .route("/cron/jobs/:id/trigger", post(jobs::trigger_job))
        .route("/cron/jobs/:id/logs", get(jobs::job_logs))
        .route("/cron/kill-switch", post(kill_switch::kill_switch))
        .route("/dashboard/overview", get(dashboard::overview))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer_token,
        ));

    Router::new()
        .nest("/api", api)
        .route("/api/events", get(ws::event_stream))
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
