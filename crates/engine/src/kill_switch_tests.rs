// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;
use warden_core::{FakeClock, Job, JobConfig, JobId, ConcurrencyPolicy, RunUlid, Schedule};

fn sample_job(id: &str) -> Job {
    Job::new(
        JobConfig {
            id: JobId::new(id),
            name: id.to_string(),
            template_id: "tmpl".into(),
            schedule: Schedule::Every { interval_ms: 1000 },
            concurrency_policy: ConcurrencyPolicy::Skip,
            one_shot: false,
            config: serde_json::json!({}),
        },
        0,
    )
}

#[test]
fn activate_stops_running_jobs_and_leaves_others_alone() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(JobRegistry::open(dir.path()).unwrap());
    let clock = Arc::new(FakeClock::new(1_000));

    registry.add_job(sample_job("running-1")).unwrap();
    registry.add_job(sample_job("idle-1")).unwrap();
    registry
        .try_claim_run(&JobId::new("running-1"), RunUlid::new("r1"), 1_000)
        .unwrap();

    let kill_switch = KillSwitch::new(registry.clone(), clock.clone());
    assert!(!kill_switch.is_active());

    let stopped = kill_switch.activate().unwrap();
    assert_eq!(stopped, vec![JobId::new("running-1")]);
    assert!(kill_switch.is_active());

    let running = registry.get_job(&JobId::new("running-1")).unwrap();
    assert_eq!(running.status, JobStatus::Disabled);
    assert!(!running.enabled);
    assert!(running.current_run_ulid.is_none());

    let idle = registry.get_job(&JobId::new("idle-1")).unwrap();
    assert_eq!(idle.status, JobStatus::Enabled);
}

#[test]
fn deactivate_clears_latch_without_reenabling_jobs() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(JobRegistry::open(dir.path()).unwrap());
    let clock = Arc::new(FakeClock::new(0));
    let kill_switch = KillSwitch::new(registry.clone(), clock);

    registry.add_job(sample_job("j1")).unwrap();
    registry
        .try_claim_run(&JobId::new("j1"), RunUlid::new("r1"), 0)
        .unwrap();
    kill_switch.activate().unwrap();
    kill_switch.deactivate().unwrap();

    assert!(!kill_switch.is_active());
    let job = registry.get_job(&JobId::new("j1")).unwrap();
    assert_eq!(job.status, JobStatus::Disabled);
    assert!(!job.enabled);
}
