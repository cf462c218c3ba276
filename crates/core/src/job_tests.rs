// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::id::JobId;

fn sample_config() -> JobConfig {
    JobConfig {
        id: JobId::new("job-1"),
        name: "pipeline-1".into(),
        template_id: "tmpl-1".into(),
        schedule: Schedule::Every { interval_ms: 60_000 },
        concurrency_policy: ConcurrencyPolicy::Skip,
        one_shot: false,
        config: serde_json::json!({}),
    }
}

#[test]
fn new_job_starts_enabled_and_unclaimed() {
    let job = Job::new(sample_config(), 100);
    assert_eq!(job.status, JobStatus::Enabled);
    assert!(!job.is_claimed());
    assert_eq!(job.created_at_ms, 100);
}

#[test]
fn claim_succeeds_once_then_fails_until_released() {
    let mut job = Job::new(sample_config(), 0);
    let ulid = RunUlid::new("01A");
    assert!(job.claim(ulid.clone(), 10));
    assert_eq!(job.status, JobStatus::Running);
    assert!(job.is_claimed());

    // second claim with a different ulid must fail without mutating state
    let other = RunUlid::new("01B");
    assert!(!job.claim(other, 20));
    assert_eq!(job.current_run_ulid, Some(ulid.clone()));

    assert!(job.release(&ulid, LastStatus::Success, 30));
    assert!(!job.is_claimed());
    assert_eq!(job.status, JobStatus::Enabled);
    assert_eq!(job.last_status, Some(LastStatus::Success));
}

#[test]
fn release_with_wrong_ulid_fails() {
    let mut job = Job::new(sample_config(), 0);
    let ulid = RunUlid::new("01A");
    assert!(job.claim(ulid, 0));
    assert!(!job.release(&RunUlid::new("wrong"), LastStatus::Success, 1));
    assert!(job.is_claimed());
}

#[test]
fn release_re_arms_when_next_run_in_future() {
    let mut job = Job::new(sample_config(), 0);
    let ulid = RunUlid::new("01A");
    job.claim(ulid.clone(), 0);
    job.next_run_at_ms = Some(1_000);
    job.release(&ulid, LastStatus::Success, 100);
    assert_eq!(job.status, JobStatus::Armed);
}

#[test]
fn one_shot_job_is_disabled_after_release_with_success() {
    let mut config = sample_config();
    config.one_shot = true;
    let mut job = Job::new(config, 0);
    let ulid = RunUlid::new("01A");
    job.claim(ulid.clone(), 0);

    assert!(job.release(&ulid, LastStatus::Success, 100));
    assert_eq!(job.status, JobStatus::Disabled);
    assert!(!job.enabled);
}

#[test]
fn one_shot_job_stays_enabled_after_release_with_failure() {
    let mut config = sample_config();
    config.one_shot = true;
    let mut job = Job::new(config, 0);
    let ulid = RunUlid::new("01A");
    job.claim(ulid.clone(), 0);

    assert!(job.release(&ulid, LastStatus::Failure, 100));
    assert_ne!(job.status, JobStatus::Disabled);
    assert!(job.enabled);
}

#[test]
fn mark_stuck_clears_claim_and_sets_timeout() {
    let mut job = Job::new(sample_config(), 0);
    job.claim(RunUlid::new("01A"), 0);
    job.mark_stuck(10_000);
    assert!(!job.is_claimed());
    assert_eq!(job.status, JobStatus::Stuck);
    assert_eq!(job.last_status, Some(LastStatus::Timeout));
}

#[test]
fn disable_and_clear_claim_drops_ownership() {
    let mut job = Job::new(sample_config(), 0);
    job.claim(RunUlid::new("01A"), 0);
    job.disable_and_clear_claim(50);
    assert!(!job.is_claimed());
    assert!(!job.enabled);
    assert_eq!(job.status, JobStatus::Disabled);
}

#[yare::parameterized(
    rate_limited_429 = (429, false, FailureClass::RateLimited),
    rate_limited_403_with_retry_after = (403, true, FailureClass::RateLimited),
    forbidden_without_retry_after_is_external = (403, false, FailureClass::External),
    not_found_is_expected = (404, false, FailureClass::Expected),
    unprocessable_is_permanent = (422, false, FailureClass::Permanent),
    server_error_is_transient = (500, false, FailureClass::Transient),
    upper_5xx_bound_is_transient = (599, false, FailureClass::Transient),
    redirect_is_external = (301, false, FailureClass::External),
)]
fn failure_class_http_status_mapping(status: u16, has_retry_after: bool, expected: FailureClass) {
    assert_eq!(FailureClass::from_http_status(status, has_retry_after), expected);
}

#[test]
fn expected_failures_are_not_countable() {
    assert!(!FailureClass::Expected.is_countable());
    assert!(FailureClass::Transient.is_countable());
    assert!(FailureClass::RateLimited.is_countable());
    assert!(FailureClass::Permanent.is_countable());
    assert!(FailureClass::External.is_countable());
}

#[test]
fn change_tracker_detects_new_and_changed_items() {
    let mut tracker = ChangeTracker::default();
    assert!(tracker.has_changed("a", "h1"));
    tracker.update("a", "h1");
    assert!(!tracker.has_changed("a", "h1"));
    assert!(tracker.has_changed("a", "h2"));
}
