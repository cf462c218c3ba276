// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! warden - thin HTTP client for `wardend`.

mod client;
mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use client::DaemonClient;
use commands::{dashboard, job, kill_switch};

#[derive(Parser)]
#[command(name = "warden", version, about = "Warden - safety-gated job scheduler CLI")]
struct Cli {
    /// Base URL of the wardend daemon (default: $WARDEN_DAEMON_URL or http://127.0.0.1:4777)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Bearer token (default: $WARDEN_BEARER_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Job create/list/update/delete/trigger/logs
    Job(job::JobArgs),
    /// Kill switch activate/deactivate
    KillSwitch(kill_switch::KillSwitchArgs),
    /// Aggregate status snapshot
    Dashboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let url = cli
        .url
        .or_else(|| std::env::var("WARDEN_DAEMON_URL").ok())
        .unwrap_or_else(|| "http://127.0.0.1:4777".to_string());

    let token = cli
        .token
        .or_else(|| std::env::var("WARDEN_BEARER_TOKEN").ok())
        .context("no bearer token: pass --token or set WARDEN_BEARER_TOKEN")?;

    let client = DaemonClient::new(url, token);

    match cli.command {
        Commands::Job(args) => job::run(&client, args).await,
        Commands::KillSwitch(args) => kill_switch::run(&client, args).await,
        Commands::Dashboard => dashboard::run(&client).await,
    }
}
