// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox jail applied to every Worker Pool exec: a filesystem
//! root, a command allowlist, a per-exec timeout and a stdout/stderr byte
//! cap. Narrowed to the jail's four concerns rather than full shell
//! parsing — the Job Runner's agent sessions talk to the Tool Firewall,
//! not to a shell, so this sandbox only needs to guard the rare tool that
//! shells out.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("command '{0}' is not on the sandbox allowlist")]
    CommandNotAllowed(String),
    #[error("exec exceeded the {0:?} timeout")]
    Timeout(Duration),
    #[error("failed to spawn '{0}': {1}")]
    SpawnFailed(String, std::io::Error),
    #[error("failed to wait on '{0}': {1}")]
    WaitFailed(String, std::io::Error),
}

/// Captured output, each stream truncated to `stdout_cap_bytes` /
/// `stderr_cap_bytes`.
#[derive(Debug, Clone)]
pub struct SandboxOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

/// Jail configuration: filesystem root, command allowlist, per-exec
/// timeout, and a byte cap applied independently to stdout and stderr.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub root: PathBuf,
    pub allowed_commands: Vec<String>,
    pub timeout: Duration,
    pub stdout_cap_bytes: usize,
    pub stderr_cap_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir(),
            allowed_commands: Vec::new(),
            timeout: Duration::from_secs(30),
            stdout_cap_bytes: 64 * 1024,
            stderr_cap_bytes: 64 * 1024,
        }
    }
}

/// A sandbox jail instance. One per worker-pool lane (or per run) rather
/// than a process-wide singleton.
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn check_allowed(&self, command: &str) -> Result<(), SandboxError> {
        if self.config.allowed_commands.iter().any(|c| c == command) {
            Ok(())
        } else {
            Err(SandboxError::CommandNotAllowed(command.to_string()))
        }
    }

    /// Run `command args...` confined to the sandbox root, under the
    /// configured timeout, with stdout/stderr capped. Enforces the timeout
    /// itself rather than relying on the caller to race it.
    pub async fn exec(&self, command: &str, args: &[String]) -> Result<SandboxOutput, SandboxError> {
        self.check_allowed(command)?;

        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(&self.config.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| SandboxError::SpawnFailed(command.to_string(), e))?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_cap = self.config.stdout_cap_bytes;
        let stderr_cap = self.config.stderr_cap_bytes;

        let run = async {
            let stdout_task = async move {
                let mut buf = Vec::new();
                let truncated = if let Some(pipe) = stdout_pipe.as_mut() {
                    read_capped(pipe, stdout_cap, &mut buf).await
                } else {
                    false
                };
                (buf, truncated)
            };
            let stderr_task = async move {
                let mut buf = Vec::new();
                let truncated = if let Some(pipe) = stderr_pipe.as_mut() {
                    read_capped(pipe, stderr_cap, &mut buf).await
                } else {
                    false
                };
                (buf, truncated)
            };
            let ((stdout, stdout_truncated), (stderr, stderr_truncated)) =
                tokio::join!(stdout_task, stderr_task);
            let status = child
                .wait()
                .await
                .map_err(|e| SandboxError::WaitFailed(command.to_string(), e))?;
            Ok::<_, SandboxError>(SandboxOutput {
                exit_code: status.code().unwrap_or(-1),
                stdout,
                stderr,
                stdout_truncated,
                stderr_truncated,
            })
        };

        match tokio::time::timeout(self.config.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(SandboxError::Timeout(self.config.timeout)),
        }
    }
}

/// Read from `pipe` until EOF or `cap` bytes have been collected, whichever
/// comes first. Returns whether the stream was truncated.
async fn read_capped(
    pipe: &mut (impl AsyncReadExt + Unpin),
    cap: usize,
    out: &mut Vec<u8>,
) -> bool {
    let mut chunk = [0u8; 4096];
    loop {
        let n = match pipe.read(&mut chunk).await {
            Ok(0) => return false,
            Ok(n) => n,
            Err(_) => return false,
        };
        let remaining = cap.saturating_sub(out.len());
        if remaining == 0 {
            // Drain the rest so the child doesn't block writing to a full
            // pipe, but stop accumulating.
            continue;
        }
        let take = remaining.min(n);
        out.extend_from_slice(&chunk[..take]);
        if out.len() >= cap {
            return true;
        }
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
