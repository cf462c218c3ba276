// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token auth middleware: every route compares the presented token
//! to the configured one in constant time.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

fn tokens_match(provided: &str, expected: &str) -> bool {
    provided.len() == expected.len() && provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

pub async fn require_bearer_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header) = header else {
        return Err(ApiError::auth_required());
    };

    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(ApiError::auth_required());
    };

    if !tokens_match(token, &state.config.bearer_token) {
        return Err(ApiError::auth_invalid());
    }

    Ok(next.run(request).await)
}
