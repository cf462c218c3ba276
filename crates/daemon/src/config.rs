// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: every tunable is a plain field on [`Config`],
//! loaded once at startup and passed by value into constructors. No
//! global statics — every component takes its config through the
//! constructor, not through ambient reads of the environment.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use warden_firewall::BreakerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not resolve a state directory: set WARDEN_STATE_DIR or HOME")]
    NoStateDir,
    #[error("WARDEN_BEARER_TOKEN must be set to a non-empty value")]
    MissingBearerToken,
    #[error("invalid bind address '{0}': {1}")]
    InvalidBindAddr(String, std::net::AddrParseError),
}

/// Daemon-wide configuration, loaded once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind_addr: std::net::SocketAddr,
    pub bearer_token: String,
    pub breaker: BreakerConfig,
    pub worker_lane_depth: usize,
    pub worker_lane_concurrency: usize,
    pub tick_interval_ms: u64,
    pub stuck_job_timeout_ms: i64,
    pub audit_rotate_bytes: u64,
    pub ws_max_connections_per_ip: usize,
    pub ws_max_frame_bytes: usize,
}

impl Config {
    /// Load configuration from the environment, applying documented
    /// defaults for anything unset.
    ///
    /// - `WARDEN_STATE_DIR` > `XDG_STATE_HOME/warden` > `~/.local/state/warden`
    /// - `WARDEN_BIND_ADDR` (default `127.0.0.1:4777`)
    /// - `WARDEN_BEARER_TOKEN` (required, no default — an empty/default
    ///   token would make the auth check meaningless)
    /// - `WARDEN_FAILURE_THRESHOLD`, `WARDEN_OPEN_DURATION_MS`,
    ///   `WARDEN_HALF_OPEN_PROBE_COUNT`, `WARDEN_ROLLING_WINDOW_MS`
    /// - `WARDEN_WORKER_LANE_DEPTH`, `WARDEN_WORKER_LANE_CONCURRENCY`
    /// - `WARDEN_TICK_INTERVAL_MS`, `WARDEN_STUCK_JOB_TIMEOUT_MS`
    /// - `WARDEN_AUDIT_ROTATE_BYTES`
    /// - `WARDEN_WS_MAX_CONNECTIONS_PER_IP`, `WARDEN_WS_MAX_FRAME_BYTES`
    pub fn load() -> Result<Self, ConfigError> {
        let data_dir = state_dir()?;

        let bind_addr = env_string("WARDEN_BIND_ADDR", "127.0.0.1:4777");
        let bind_addr = bind_addr
            .parse()
            .map_err(|e| ConfigError::InvalidBindAddr(bind_addr.clone(), e))?;

        let bearer_token = std::env::var("WARDEN_BEARER_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingBearerToken)?;

        Ok(Self {
            data_dir,
            bind_addr,
            bearer_token,
            breaker: BreakerConfig {
                failure_threshold: env_u32("WARDEN_FAILURE_THRESHOLD", 5),
                open_duration_ms: env_i64("WARDEN_OPEN_DURATION_MS", 30 * 60 * 1000),
                half_open_probe_count: env_u32("WARDEN_HALF_OPEN_PROBE_COUNT", 2),
                rolling_window_ms: env_i64("WARDEN_ROLLING_WINDOW_MS", 60 * 60 * 1000),
            },
            worker_lane_depth: env_usize("WARDEN_WORKER_LANE_DEPTH", 10),
            worker_lane_concurrency: env_usize("WARDEN_WORKER_LANE_CONCURRENCY", 4),
            tick_interval_ms: env_u64("WARDEN_TICK_INTERVAL_MS", 60_000),
            stuck_job_timeout_ms: env_i64("WARDEN_STUCK_JOB_TIMEOUT_MS", 2 * 60 * 60 * 1000),
            audit_rotate_bytes: env_u64("WARDEN_AUDIT_ROTATE_BYTES", 32 * 1024 * 1024),
            ws_max_connections_per_ip: env_usize("WARDEN_WS_MAX_CONNECTIONS_PER_IP", 4),
            ws_max_frame_bytes: env_usize("WARDEN_WS_MAX_FRAME_BYTES", 64 * 1024),
        })
    }

    pub fn registry_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join("audit").join("audit.jsonl")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("wardend.log")
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("WARDEN_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = dirs::state_dir() {
        return Ok(xdg.join("warden"));
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoStateDir)?;
    Ok(home.join(".local/state/warden"))
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}
