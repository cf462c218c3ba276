// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `warden dashboard` - aggregate status snapshot.

use anyhow::Result;

use crate::client::DaemonClient;

pub async fn run(client: &DaemonClient) -> Result<()> {
    let overview = client.dashboard_overview().await?;
    println!("{}", serde_json::to_string_pretty(&overview)?);
    Ok(())
}
