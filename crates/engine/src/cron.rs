// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron Service: the coordinator. Detects due jobs, claims a
//! run via CAS, invokes the installed executor (normally a bridge into the
//! Job Runner running on the Worker Pool), and re-arms the job's next fire
//! time. The kill switch and circuit breaker are consulted before every
//! claim; their errors are swallowed on the periodic sweep and surfaced as
//! a typed `false` on the manual trigger path.

use crate::kill_switch::KillSwitch;
use crate::schedule::{next_run_after, ScheduleError};
use crate::worker_pool::{Lane, WorkerPool};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use warden_core::{
    AbortSignal, BreakerState, CircuitBreakerState, Clock, Event, EventSink, IdGen, Job,
    JobConfig, JobId, JobStatus, LastStatus, RunUlid,
};
use warden_firewall::{CircuitBreakerRegistry, Transition};
use warden_storage::{JobRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum CronError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("job not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy)]
pub struct CronConfig {
    pub tick_interval_ms: u64,
    pub stuck_job_timeout_ms: i64,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 60_000,
            stuck_job_timeout_ms: 2 * 60 * 60 * 1000,
        }
    }
}

/// Bridge from the Cron Service to the Job Runner. Returning `Ok(())` means
/// the executor has taken ownership of releasing the CAS token (typically
/// by handing the run to the Worker Pool, which drives the Job Runner and
/// calls `registry.release_run` when it finishes). Returning `Err` means
/// the executor failed synchronously before taking ownership — the Cron
/// Service releases the token itself and records `lastStatus = failure`.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: Job, run_ulid: RunUlid, abort: AbortSignal) -> Result<(), String>;
}

struct TickHandle {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// The coordinator.
pub struct CronService {
    registry: Arc<JobRegistry>,
    breaker: Arc<CircuitBreakerRegistry>,
    kill_switch: Arc<KillSwitch>,
    worker_pool: Arc<WorkerPool>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGen>,
    config: CronConfig,
    executor: Mutex<Option<Arc<dyn JobExecutor>>>,
    tick: Mutex<Option<TickHandle>>,
    running_aborts: Mutex<HashMap<String, AbortSignal>>,
}

impl CronService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<JobRegistry>,
        breaker: Arc<CircuitBreakerRegistry>,
        worker_pool: Arc<WorkerPool>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGen>,
        config: CronConfig,
    ) -> Arc<Self> {
        let kill_switch = Arc::new(KillSwitch::new(registry.clone(), clock.clone()));
        Arc::new(Self {
            registry,
            breaker,
            kill_switch,
            worker_pool,
            events,
            clock,
            id_gen,
            config,
            executor: Mutex::new(None),
            tick: Mutex::new(None),
            running_aborts: Mutex::new(HashMap::new()),
        })
    }

    pub fn set_executor(&self, executor: Arc<dyn JobExecutor>) {
        *self.executor.lock() = Some(executor);
    }

    pub fn is_kill_switch_active(&self) -> bool {
        self.kill_switch.is_active()
    }

    /// Returns the per-job circuit breaker instance's current state.
    pub fn get_breaker(&self, id: &JobId) -> CircuitBreakerState {
        self.breaker.get_state(id)
    }

    /// Runs stuck-job recovery, restores circuit breaker state, arms every
    /// enabled-but-unarmed job, then begins the periodic tick. Audit chain
    /// verification and registry load happen before a `CronService` is even
    /// constructed — they're the daemon's startup responsibility.
    pub fn start(self: &Arc<Self>) -> Result<(), CronError> {
        self.detect_stuck_jobs()?;
        self.restore_breaker_states();
        self.arm_unarmed_jobs()?;
        self.begin_ticking();
        Ok(())
    }

    /// Stop the periodic tick. Does not cancel in-flight executions.
    pub fn stop(&self) {
        if let Some(handle) = self.tick.lock().take() {
            handle.stop.store(true, Ordering::SeqCst);
            handle.join.abort();
        }
    }

    fn restore_breaker_states(&self) {
        for job in self.registry.get_jobs() {
            self.breaker.restore_state(&job.id, job.circuit_breaker.clone());
        }
    }

    fn begin_ticking(self: &Arc<Self>) {
        let stop = Arc::new(AtomicBool::new(false));
        let interval = std::time::Duration::from_millis(self.config.tick_interval_ms);
        let this = self.clone();
        let stop_flag = stop.clone();
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }
                this.run_due_jobs();
            }
        });
        *self.tick.lock() = Some(TickHandle { stop, join });
    }

    /// Persist a new job and arm it with a future `next_run_at_ms`.
    pub fn create_job(&self, config: JobConfig) -> Result<Job, CronError> {
        let now = self.clock.now_ms();
        let mut job = Job::new(config, now);
        if let Some(next) = next_run_after(&job.schedule, now)? {
            job.arm(next, now);
        }
        self.registry.add_job(job.clone())?;
        if let Some(next) = job.next_run_at_ms {
            self.events.emit(Event::JobArmed {
                job_id: job.id.clone(),
                next_run_at_ms: next,
            });
        }
        Ok(job)
    }

    pub fn update_job<F: FnOnce(&mut Job)>(&self, id: &JobId, patch: F) -> Result<bool, CronError> {
        Ok(self.registry.update_job(id, patch)?)
    }

    pub fn delete_job(&self, id: &JobId) -> Result<bool, CronError> {
        Ok(self.registry.delete_job(id)?)
    }

    fn arm_unarmed_jobs(&self) -> Result<(), CronError> {
        let now = self.clock.now_ms();
        for job in self.registry.get_jobs() {
            if job.enabled && job.next_run_at_ms.is_none() && job.status != JobStatus::Running {
                if let Some(next) = next_run_after(&job.schedule, now)? {
                    let id = job.id.clone();
                    self.registry.update_job(&id, |j| j.arm(next, now))?;
                    self.events.emit(Event::JobArmed {
                        job_id: id,
                        next_run_at_ms: next,
                    });
                }
            }
        }
        Ok(())
    }

    /// Manual-fire path. Returns `false` without
    /// dispatching if the job is missing, the kill switch is active, the
    /// breaker blocks, or the CAS fails.
    pub fn trigger_job(self: &Arc<Self>, id: &JobId) -> bool {
        self.prune_finished_aborts();

        let Some(job) = self.registry.get_job(id) else {
            return false;
        };
        if self.kill_switch.is_active() {
            return false;
        }
        let now = self.clock.now_ms();
        let (can_run, transition) = self.breaker.can_execute(id, now);
        if let Some(t) = transition {
            self.emit_breaker_transition(id, t);
        }
        if !can_run {
            return false;
        }

        let run_ulid = self.id_gen.next_run_ulid();
        if !self.registry.try_claim_run(id, run_ulid.clone(), now).unwrap_or(false) {
            return false;
        }

        self.dispatch(job, run_ulid, Lane::Interactive);
        true
    }

    /// Periodic sweep. Silently skips jobs the
    /// kill switch, breaker, or CAS block — those are not errors worth
    /// surfacing on a tick, only on an explicit trigger.
    pub fn run_due_jobs(self: &Arc<Self>) {
        self.prune_finished_aborts();

        if self.kill_switch.is_active() {
            return;
        }

        let now = self.clock.now_ms();
        let due: Vec<Job> = self
            .registry
            .get_jobs()
            .into_iter()
            .filter(|j| {
                j.enabled
                    && j.status == JobStatus::Armed
                    && j.next_run_at_ms.map(|t| t <= now).unwrap_or(false)
            })
            .collect();

        for job in due {
            let (can_run, transition) = self.breaker.can_execute(&job.id, now);
            if let Some(t) = transition {
                self.emit_breaker_transition(&job.id, t);
            }
            if !can_run {
                continue;
            }

            let run_ulid = self.id_gen.next_run_ulid();
            let claimed = self
                .registry
                .try_claim_run(&job.id, run_ulid.clone(), now)
                .unwrap_or(false);
            if !claimed {
                continue;
            }

            // Schedule the next occurrence before dispatch so a
            // long-running executor doesn't delay re-arming. One-shot jobs
            // are left alone here — `Job::release` disables them once the
            // run actually succeeds, so a failed attempt stays eligible.
            if !job.one_shot {
                if let Ok(Some(next)) = next_run_after(&job.schedule, now) {
                    let id = job.id.clone();
                    let _ = self.registry.update_job(&id, |j| {
                        j.next_run_at_ms = Some(next);
                    });
                }
            }

            self.dispatch(job, run_ulid, Lane::System);
        }
    }

    /// Hands a claimed run to the worker pool. Never blocks the caller — the
    /// executor runs on whichever lane worker picks up the boxed future, not
    /// on the cron tick task or the HTTP handler thread calling
    /// `trigger_job`.
    fn dispatch(self: &Arc<Self>, job: Job, run_ulid: RunUlid, lane: Lane) {
        let job_id = job.id.clone();
        let abort = AbortSignal::new();
        self.running_aborts
            .lock()
            .insert(job_id.as_str().to_string(), abort.clone());

        self.events.emit(Event::JobStarted {
            job_id: job_id.clone(),
            run_ulid: run_ulid.clone(),
        });

        let Some(executor) = self.executor.lock().clone() else {
            let now = self.clock.now_ms();
            let _ = self
                .registry
                .release_run(&job_id, &run_ulid, LastStatus::Failure, now);
            self.running_aborts.lock().remove(job_id.as_str());
            return;
        };

        let this = self.clone();
        let dispatch_job_id = job_id.clone();
        let dispatch_run_ulid = run_ulid.clone();
        let future: crate::worker_pool::BoxedJob = Box::pin(async move {
            if let Err(message) = executor.execute(job, run_ulid.clone(), abort).await {
                tracing::warn!(
                    job_id = %job_id,
                    %message,
                    "executor failed synchronously, releasing claim"
                );
                let now = this.clock.now_ms();
                let _ = this
                    .registry
                    .release_run(&job_id, &run_ulid, LastStatus::Failure, now);
            }
        });

        if self.worker_pool.try_submit(lane, future).is_err() {
            tracing::warn!(job_id = %dispatch_job_id, "worker pool lane full, releasing claim");
            let now = self.clock.now_ms();
            let _ = self.registry.release_run(
                &dispatch_job_id,
                &dispatch_run_ulid,
                LastStatus::Failure,
                now,
            );
            self.running_aborts.lock().remove(dispatch_job_id.as_str());
        }
    }

    fn prune_finished_aborts(&self) {
        let mut aborts = self.running_aborts.lock();
        aborts.retain(|job_id, _| {
            self.registry
                .get_job(&JobId::new(job_id.as_str()))
                .map(|j| j.status == JobStatus::Running)
                .unwrap_or(false)
        });
    }

    /// Same policy as `registry.recover_stuck_jobs`, but emits `job:stuck`
    /// per recovered job.
    pub fn detect_stuck_jobs(&self) -> Result<Vec<JobId>, CronError> {
        let now = self.clock.now_ms();
        let recovered = self
            .registry
            .recover_stuck_jobs(self.config.stuck_job_timeout_ms, now)?;
        for id in &recovered {
            self.events.emit(Event::JobStuck { job_id: id.clone() });
            self.running_aborts.lock().remove(id.as_str());
        }
        Ok(recovered)
    }

    /// Maps a breaker [`Transition`] to the `circuit:opened`/`circuit:closed`
    /// events. The `open -> half_open` probe transition has no
    /// dedicated event — it's an internal retry admission, not a state the
    /// operator needs to react to.
    fn emit_breaker_transition(&self, job_id: &JobId, transition: Transition) {
        match transition.to {
            BreakerState::Open => self.events.emit(Event::CircuitOpened {
                job_id: job_id.clone(),
                from: transition.from,
            }),
            BreakerState::Closed => self.events.emit(Event::CircuitClosed {
                job_id: job_id.clone(),
                from: transition.from,
            }),
            BreakerState::HalfOpen => {}
        }
    }

    /// Activates the kill switch: flips the durable latch (which also
    /// disables every currently-running job and clears its claim),
    /// then cancels every tracked in-flight abort signal so the
    /// Tool Firewall and Job Runner observe the cancellation promptly.
    pub fn activate_kill_switch(&self) -> Result<Vec<JobId>, CronError> {
        let stopped = self.kill_switch.activate()?;
        let mut aborts = self.running_aborts.lock();
        for signal in aborts.values() {
            signal.cancel();
        }
        aborts.clear();
        Ok(stopped)
    }

    pub fn deactivate_kill_switch(&self) -> Result<(), CronError> {
        Ok(self.kill_switch.deactivate()?)
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
