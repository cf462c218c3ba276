// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded worker pool with two lanes: `interactive` for
//! operator-triggered runs, `system` for cron-driven ones. Each lane is a
//! bounded `tokio::sync::mpsc` queue so a flood of due jobs backpressures
//! instead of spawning unbounded tasks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

pub type BoxedJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Interactive,
    System,
}

impl Lane {
    fn label(self) -> &'static str {
        match self {
            Lane::Interactive => "interactive",
            Lane::System => "system",
        }
    }
}

struct LaneHandle {
    tx: mpsc::Sender<BoxedJob>,
    worker: JoinHandle<()>,
}

/// A lane-partitioned pool of bounded task queues, each drained by a single
/// worker loop gated by a concurrency semaphore.
pub struct WorkerPool {
    lanes: std::collections::HashMap<Lane, LaneHandle>,
}

impl WorkerPool {
    /// `depth` bounds the queue per lane; `concurrency` bounds how many
    /// tasks within that lane may run at once.
    pub fn new(depth: usize, concurrency: usize) -> Self {
        let mut lanes = std::collections::HashMap::new();
        for lane in [Lane::Interactive, Lane::System] {
            lanes.insert(lane, Self::spawn_lane(lane, depth, concurrency));
        }
        Self { lanes }
    }

    fn spawn_lane(lane: Lane, depth: usize, concurrency: usize) -> LaneHandle {
        let (tx, mut rx) = mpsc::channel::<BoxedJob>(depth);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let permit = semaphore.clone().acquire_owned().await;
                tokio::spawn(async move {
                    job.await;
                    drop(permit);
                });
            }
            tracing::debug!(lane = lane.label(), "worker pool lane drained");
        });
        LaneHandle { tx, worker }
    }

    /// Submit a job to a lane's queue. Fails (without blocking) if the
    /// lane's queue is currently full — callers should treat this as
    /// "try again on the next tick" rather than an error to surface.
    pub fn try_submit(&self, lane: Lane, job: BoxedJob) -> Result<(), BoxedJob> {
        match self.lanes.get(&lane) {
            Some(handle) => handle.tx.try_send(job).map_err(|e| match e {
                mpsc::error::TrySendError::Full(job) => job,
                mpsc::error::TrySendError::Closed(job) => job,
            }),
            None => Err(job),
        }
    }

    /// Stop accepting new work and wait (up to `deadline`) for in-flight
    /// lane workers to drain. Workers still running past the deadline are
    /// abandoned (their tasks are not forcibly killed; the process exit
    /// itself reclaims them).
    pub async fn shutdown(self, deadline: std::time::Duration) {
        let mut handles = Vec::new();
        for (_, handle) in self.lanes {
            drop(handle.tx);
            handles.push(handle.worker);
        }
        let _ = tokio::time::timeout(deadline, futures_join_all(handles)).await;
    }
}

async fn futures_join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
