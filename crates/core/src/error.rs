// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across crates.
//!
//! Every fallible operation in the core eventually converts into one of
//! these kinds. The HTTP boundary maps `code()` directly into the
//! `{error, code}` response envelope.

use std::fmt;

/// The taxonomy of error kinds a caller-visible failure can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthRequired,
    AuthInvalid,
    NotFound,
    Validation,
    PolicyDenied,
    RateLimit,
    CircuitOpen,
    KillSwitchActive,
    ConcurrencyConflict,
    External,
    Timeout,
    Integrity,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code for the `{error, code}` HTTP envelope.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::AuthRequired => "AUTH_REQUIRED",
            ErrorKind::AuthInvalid => "AUTH_INVALID",
            ErrorKind::NotFound => "JOB_NOT_FOUND",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::PolicyDenied => "POLICY_DENIED",
            ErrorKind::RateLimit => "RATE_LIMITED",
            ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
            ErrorKind::KillSwitchActive => "KILL_SWITCH_ACTIVE",
            ErrorKind::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            ErrorKind::External => "EXTERNAL_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Integrity => "INTEGRITY_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A caller-visible error: a kind plus a human-readable message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct WardenError {
    pub kind: ErrorKind,
    pub message: String,
}

impl WardenError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}
