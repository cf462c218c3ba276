// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps the core error taxonomy onto the `{error, code}` JSON
//! envelope and HTTP status codes every endpoint returns.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use warden_core::{ErrorKind, WardenError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// A caller-visible API error, carrying the status code this kind maps to.
#[derive(Debug)]
pub struct ApiError(pub WardenError);

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self(WardenError::new(kind, message))
    }

    pub fn auth_required() -> Self {
        Self::new(ErrorKind::AuthRequired, "missing or malformed Authorization header")
    }

    pub fn auth_invalid() -> Self {
        Self::new(ErrorKind::AuthInvalid, "bearer token did not match")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    fn status(&self) -> StatusCode {
        match self.0.kind {
            ErrorKind::AuthRequired => StatusCode::UNAUTHORIZED,
            ErrorKind::AuthInvalid => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::PolicyDenied => StatusCode::FORBIDDEN,
            ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::KillSwitchActive => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ConcurrencyConflict => StatusCode::CONFLICT,
            ErrorKind::External => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Integrity => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WardenError> for ApiError {
    fn from(e: WardenError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.0.message.clone(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

/// Special-case: a 404 for routes that don't exist at all, distinct from
/// `JOB_NOT_FOUND` for a valid route with a missing resource.
pub async fn route_not_found() -> Response {
    let body = ErrorBody {
        error: "no route matches this path".to_string(),
        code: "ROUTE_NOT_FOUND",
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
