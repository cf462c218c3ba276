// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the scheduling/execution runtime.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("template not found: {0}")]
    TemplateNotFound(String),
    #[error("kill switch is active")]
    KillSwitchActive,
    #[error("job already running")]
    AlreadyRunning,
    #[error("worker pool lane is full: {0}")]
    LaneFull(String),
    #[error("registry error: {0}")]
    Registry(#[from] warden_storage::RegistryError),
    #[error("audit error: {0}")]
    Audit(#[from] warden_storage::AuditError),
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
}
