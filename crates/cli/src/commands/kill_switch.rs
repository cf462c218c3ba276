// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `warden kill-switch` - global latch.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::client::DaemonClient;

#[derive(Args)]
pub struct KillSwitchArgs {
    #[command(subcommand)]
    pub command: KillSwitchCommand,
}

#[derive(Subcommand)]
pub enum KillSwitchCommand {
    /// Halt and disable all in-flight and armed jobs
    Activate,
    /// Clear the latch (does not re-enable jobs)
    Deactivate,
}

pub async fn run(client: &DaemonClient, args: KillSwitchArgs) -> Result<()> {
    let activate = matches!(args.command, KillSwitchCommand::Activate);
    let result = client.kill_switch(activate).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
