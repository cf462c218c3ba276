// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `warden job` - job CRUD, manual trigger, run-log inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::client::DaemonClient;

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Create a job
    Create {
        name: String,
        /// Template id the job runs against
        #[arg(long)]
        template: String,
        /// Schedule expression, e.g. "every:1h" or "cron:0 * * * *" or "once:2026-08-01T00:00:00Z"
        #[arg(long)]
        schedule: String,
        #[arg(long)]
        one_shot: bool,
    },
    /// List all jobs
    List,
    /// Update a job's name, schedule, or enabled flag
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// Delete a job
    Delete { id: String },
    /// Manually trigger a job outside its schedule
    Trigger { id: String },
    /// Show a job's run history
    Logs {
        id: String,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
}

/// Parses `every:<duration>` (e.g. `1h`, `30m`, `45s`), `cron:<5-field expr>`,
/// or `once:<RFC3339 timestamp>` into the wire shape of [`warden_core::Schedule`].
fn parse_schedule(expr: &str) -> Result<serde_json::Value> {
    let (kind, rest) = expr
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("schedule must be '<kind>:<expression>', got '{expr}'"))?;

    match kind {
        "every" => {
            let interval_ms = parse_duration_ms(rest)?;
            Ok(serde_json::json!({ "kind": "every", "interval_ms": interval_ms }))
        }
        "cron" => Ok(serde_json::json!({ "kind": "cron", "expression": rest })),
        "once" => {
            let at_ms = chrono::DateTime::parse_from_rfc3339(rest)
                .map_err(|e| anyhow::anyhow!("invalid RFC3339 timestamp '{rest}': {e}"))?
                .timestamp_millis();
            Ok(serde_json::json!({ "kind": "once", "at_ms": at_ms }))
        }
        other => anyhow::bail!("unknown schedule kind '{other}', expected every/cron/once"),
    }
}

fn parse_duration_ms(s: &str) -> Result<u64> {
    let (digits, unit) = s
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| s.split_at(i))
        .ok_or_else(|| anyhow::anyhow!("duration '{s}' is missing a unit (ms/s/m/h)"))?;
    let value: u64 = digits.parse().map_err(|_| anyhow::anyhow!("invalid duration '{s}'"))?;
    let multiplier = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => anyhow::bail!("unknown duration unit '{other}' in '{s}'"),
    };
    Ok(value * multiplier)
}

pub async fn run(client: &DaemonClient, args: JobArgs) -> Result<()> {
    match args.command {
        JobCommand::Create {
            name,
            template,
            schedule,
            one_shot,
        } => {
            let body = serde_json::json!({
                "name": name,
                "template_id": template,
                "schedule": parse_schedule(&schedule)?,
                "one_shot": one_shot,
            });
            let job = client.create_job(body).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        JobCommand::List => {
            let jobs = client.list_jobs().await?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        JobCommand::Update { id, name, enabled } => {
            let mut body = serde_json::Map::new();
            if let Some(name) = name {
                body.insert("name".to_string(), serde_json::Value::String(name));
            }
            if let Some(enabled) = enabled {
                body.insert("enabled".to_string(), serde_json::Value::Bool(enabled));
            }
            let job = client.update_job(&id, serde_json::Value::Object(body)).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        JobCommand::Delete { id } => {
            client.delete_job(&id).await?;
            println!("deleted {id}");
        }
        JobCommand::Trigger { id } => {
            let result = client.trigger_job(&id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        JobCommand::Logs { id, limit, offset } => {
            let records = client.job_logs(&id, limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}
