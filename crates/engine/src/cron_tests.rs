// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::worker_pool::WorkerPool;
use async_trait::async_trait;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::{mpsc, Notify};
use warden_core::{ConcurrencyPolicy, FailureClass, SequentialIdGen, Schedule};

fn make_service(dir: &std::path::Path, clock: Arc<FakeClockInner>) -> Arc<CronService> {
    let registry = Arc::new(JobRegistry::open(dir).unwrap());
    let breaker = Arc::new(CircuitBreakerRegistry::new(Default::default()));
    let worker_pool = Arc::new(WorkerPool::new(8, 4));
    CronService::new(
        registry,
        breaker,
        worker_pool,
        Arc::new(warden_core::NoopEventSink),
        clock,
        Arc::new(SequentialIdGen::new("test")),
        CronConfig::default(),
    )
}

// Alias kept local so the helper signature above reads naturally; FakeClock
// already implements Clock, this just avoids repeating the trait object type.
type FakeClockInner = dyn Clock;

fn job_config(id: &str, interval_ms: u64) -> JobConfig {
    JobConfig {
        id: JobId::new(id),
        name: id.into(),
        template_id: "noop".into(),
        schedule: Schedule::Every { interval_ms },
        concurrency_policy: ConcurrencyPolicy::Skip,
        one_shot: false,
        config: serde_json::json!({}),
    }
}

struct RecordingExecutor {
    registry: Arc<JobRegistry>,
    clock: Arc<dyn Clock>,
    tx: mpsc::UnboundedSender<JobId>,
}

#[async_trait]
impl JobExecutor for RecordingExecutor {
    async fn execute(&self, job: Job, run_ulid: RunUlid, _abort: AbortSignal) -> Result<(), String> {
        let now = self.clock.now_ms();
        let _ = self
            .registry
            .release_run(&job.id, &run_ulid, LastStatus::Success, now);
        let _ = self.tx.send(job.id.clone());
        Ok(())
    }
}

/// Releases with a configurable `LastStatus`, for exercising the one-shot
/// disable-on-success-only path.
struct OutcomeExecutor {
    registry: Arc<JobRegistry>,
    clock: Arc<dyn Clock>,
    last_status: LastStatus,
    tx: mpsc::UnboundedSender<JobId>,
}

#[async_trait]
impl JobExecutor for OutcomeExecutor {
    async fn execute(&self, job: Job, run_ulid: RunUlid, _abort: AbortSignal) -> Result<(), String> {
        let now = self.clock.now_ms();
        let _ = self
            .registry
            .release_run(&job.id, &run_ulid, self.last_status, now);
        let _ = self.tx.send(job.id.clone());
        Ok(())
    }
}

#[tokio::test]
async fn create_job_arms_with_a_future_next_run_time() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(warden_core::FakeClock::new(1_000));
    let service = make_service(dir.path(), clock);

    let job = service.create_job(job_config("j1", 60_000)).unwrap();
    assert_eq!(job.status, JobStatus::Armed);
    assert_eq!(job.next_run_at_ms, Some(61_000));
}

#[tokio::test]
async fn run_due_jobs_dispatches_through_the_worker_pool() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(warden_core::FakeClock::new(1_000));
    let service = make_service(dir.path(), clock.clone());

    service.create_job(job_config("j1", 0)).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    service.set_executor(Arc::new(RecordingExecutor {
        registry: {
            // Re-open a handle against the same data dir so the executor's
            // release call lands on the same durable state as the service's
            // registry (CronService doesn't expose its own Arc<JobRegistry>).
            Arc::new(JobRegistry::open(dir.path()).unwrap())
        },
        clock: clock.clone(),
        tx,
    }));

    service.run_due_jobs();

    let dispatched = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("executor ran within timeout")
        .expect("channel open");
    assert_eq!(dispatched.as_str(), "j1");
}

#[tokio::test]
async fn trigger_job_returns_false_once_kill_switch_is_active() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(warden_core::FakeClock::new(1_000));
    let service = make_service(dir.path(), clock);

    let job = service.create_job(job_config("j1", 60_000)).unwrap();
    service.activate_kill_switch().unwrap();

    assert!(!service.trigger_job(&job.id));
}

#[tokio::test]
async fn trigger_job_returns_false_when_the_breaker_is_open() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(warden_core::FakeClock::new(1_000));
    let service = make_service(dir.path(), clock.clone());

    let job = service.create_job(job_config("j1", 60_000)).unwrap();
    for _ in 0..10 {
        service
            .breaker
            .record_failure(&job.id, FailureClass::External, clock.now_ms());
    }

    assert!(!service.trigger_job(&job.id));
}

#[tokio::test]
async fn trigger_job_returns_false_for_an_unknown_job() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(warden_core::FakeClock::new(1_000));
    let service = make_service(dir.path(), clock);

    assert!(!service.trigger_job(&JobId::new("missing")));
}

#[tokio::test]
async fn detect_stuck_jobs_recovers_claims_older_than_the_timeout() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(warden_core::FakeClock::new(1_000));
    let service = make_service(dir.path(), clock.clone());

    let job = service.create_job(job_config("j1", 60_000)).unwrap();
    service
        .registry
        .try_claim_run(&job.id, RunUlid::new("run-1"), clock.now_ms())
        .unwrap();

    clock.advance_ms(service.config.stuck_job_timeout_ms + 1);
    let recovered = service.detect_stuck_jobs().unwrap();

    assert_eq!(recovered, vec![job.id.clone()]);
    let stored = service.registry.get_job(&job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Stuck);
    assert!(stored.current_run_ulid.is_none());
}

#[tokio::test]
async fn activate_kill_switch_cancels_in_flight_abort_signals() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(warden_core::FakeClock::new(1_000));
    let service = make_service(dir.path(), clock.clone());

    service.create_job(job_config("j1", 0)).unwrap();

    let abort_slot: Arc<parking_lot::Mutex<Option<AbortSignal>>> =
        Arc::new(parking_lot::Mutex::new(None));
    let started = Arc::new(Notify::new());
    let proceed = Arc::new(Notify::new());

    struct BlockingExecutor {
        abort_slot: Arc<parking_lot::Mutex<Option<AbortSignal>>>,
        started: Arc<Notify>,
        proceed: Arc<Notify>,
    }

    #[async_trait]
    impl JobExecutor for BlockingExecutor {
        async fn execute(
            &self,
            _job: Job,
            _run_ulid: RunUlid,
            abort: AbortSignal,
        ) -> Result<(), String> {
            *self.abort_slot.lock() = Some(abort);
            self.started.notify_one();
            self.proceed.notified().await;
            Ok(())
        }
    }

    service.set_executor(Arc::new(BlockingExecutor {
        abort_slot: abort_slot.clone(),
        started: started.clone(),
        proceed: proceed.clone(),
    }));

    service.run_due_jobs();
    tokio::time::timeout(Duration::from_secs(2), started.notified())
        .await
        .expect("executor started within timeout");

    service.activate_kill_switch().unwrap();

    let captured = abort_slot.lock().clone().expect("abort signal captured");
    assert!(captured.is_cancelled());

    proceed.notify_one();
}

#[tokio::test]
async fn one_shot_job_is_disabled_after_a_successful_run() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(warden_core::FakeClock::new(1_000));
    let service = make_service(dir.path(), clock.clone());

    let mut config = job_config("j1", 0);
    config.one_shot = true;
    let job = service.create_job(config).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    service.set_executor(Arc::new(OutcomeExecutor {
        registry: Arc::new(JobRegistry::open(dir.path()).unwrap()),
        clock: clock.clone(),
        last_status: LastStatus::Success,
        tx,
    }));

    service.run_due_jobs();
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("executor ran within timeout")
        .expect("channel open");

    let stored = service.registry.get_job(&job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Disabled);
    assert!(!stored.enabled);
}

#[tokio::test]
async fn one_shot_job_stays_enabled_after_a_failed_run() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(warden_core::FakeClock::new(1_000));
    let service = make_service(dir.path(), clock.clone());

    let mut config = job_config("j1", 0);
    config.one_shot = true;
    let job = service.create_job(config).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    service.set_executor(Arc::new(OutcomeExecutor {
        registry: Arc::new(JobRegistry::open(dir.path()).unwrap()),
        clock: clock.clone(),
        last_status: LastStatus::Failure,
        tx,
    }));

    service.run_due_jobs();
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("executor ran within timeout")
        .expect("channel open");

    let stored = service.registry.get_job(&job.id).unwrap();
    assert_ne!(stored.status, JobStatus::Disabled);
    assert!(stored.enabled);
}

#[tokio::test]
async fn get_breaker_reflects_the_live_registry_state() {
    let dir = tempdir().unwrap();
    let clock = Arc::new(warden_core::FakeClock::new(1_000));
    let service = make_service(dir.path(), clock.clone());

    let job = service.create_job(job_config("j1", 60_000)).unwrap();
    for _ in 0..10 {
        service
            .breaker
            .record_failure(&job.id, FailureClass::External, clock.now_ms());
    }

    assert_eq!(service.get_breaker(&job.id).state, BreakerState::Open);
}
