// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Warden Daemon (wardend)
//!
//! Background process that owns the Job Registry, Audit Log, Circuit
//! Breakers, Worker Pool and Cron Service, and exposes them over an HTTP +
//! WebSocket surface.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use warden_daemon::config::{Config, ConfigError};
use warden_daemon::runtime::{RuntimeBuilder, RuntimeError};
use warden_daemon::state::AppState;
use warden_daemon::ws::{BroadcastSink, ConnectionTracker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("wardend {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("wardend {}", env!("CARGO_PKG_VERSION"));
                println!("Warden daemon - safety-gated job scheduler with firewalled tool execution");
                println!();
                println!("USAGE:");
                println!("    wardend");
                println!();
                println!("Configuration is read entirely from the environment; see");
                println!("warden_daemon::config::Config for the full list of WARDEN_* variables.");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: wardend [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    write_startup_marker(&config)?;
    let log_guard = setup_logging(&config)?;

    info!("starting warden daemon");

    let builder = RuntimeBuilder::new(config.clone());
    let runtime = match builder.build_and_start() {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            write_startup_error(&config, &e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let broadcast = BroadcastSink::new();
    runtime.events.subscribe(broadcast.clone());
    let connections = ConnectionTracker::new();

    let state = AppState::new(Arc::new(config.clone()), runtime.clone(), broadcast, connections);
    let app = warden_daemon::http::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, tick_interval = ?config.tick_interval(), "listening");
    println!("READY");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
    });

    if let Err(e) = server.await {
        error!(error = %e, "server error");
    }

    runtime.cron.stop();
    info!("warden daemon stopped");
    Ok(())
}

const STARTUP_MARKER_PREFIX: &str = "--- wardend: starting (pid: ";

fn write_startup_marker(config: &Config) -> Result<(), ConfigError> {
    use std::io::Write;

    if let Some(parent) = config.log_path().parent() {
        std::fs::create_dir_all(parent).map_err(|_| ConfigError::NoStateDir)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .map_err(|_| ConfigError::NoStateDir)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())
        .map_err(|_| ConfigError::NoStateDir)?;
    Ok(())
}

fn write_startup_error(config: &Config, error: &RuntimeError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start runtime: {error}");
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, ConfigError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path().parent() {
        std::fs::create_dir_all(parent).map_err(|_| ConfigError::NoStateDir)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path().parent().ok_or(ConfigError::NoStateDir)?,
        config
            .log_path()
            .file_name()
            .ok_or(ConfigError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
