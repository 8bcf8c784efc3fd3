//! In-process job queue for plan generation.
//!
//! [`JobQueue::submit`] hands a plan id to a dispatcher task over an
//! unbounded channel and returns immediately. The dispatcher spawns one task
//! per job; a semaphore bounds how many run at once. The queue tracks which
//! plan ids are waiting or running so pollers can skip them with
//! [`JobQueue::submit_new`].
//!
//! Shutdown:
//! - cancelling the token stops dispatching, jobs still waiting for a permit
//!   are dropped (their plans stay `pending`), and running jobs get
//!   [`DRAIN_TIMEOUT`] to finish before being aborted;
//! - dropping every [`JobQueue`] handle closes the channel and the
//!   dispatcher waits for all submitted jobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use stride_db::models::PlanStatus;
use stride_db::queries::plans as plan_db;

use crate::orchestrator::{JobOutcome, Orchestrator, failure_record};

/// How long running jobs get to finish after cancellation.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure message for plans found `generating` at startup.
pub const ORPHANED_PLAN_MESSAGE: &str = "worker restarted during generation";

/// Submitted jobs not yet finished, counted per plan id.
type InFlight = Arc<Mutex<HashMap<Uuid, usize>>>;

fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<Uuid, usize>> {
    in_flight.lock().unwrap_or_else(|e| e.into_inner())
}

/// Releases one in-flight count when a job ends, however it ends.
struct InFlightGuard {
    in_flight: InFlight,
    plan_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut map = lock(&self.in_flight);
        if let Some(count) = map.get_mut(&self.plan_id) {
            *count -= 1;
            if *count == 0 {
                map.remove(&self.plan_id);
            }
        }
    }
}

/// Submission side of the queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Uuid>,
    in_flight: InFlight,
}

/// Owns the dispatcher task.
pub struct QueueHandle {
    dispatcher: JoinHandle<DrainReport>,
    cancel: CancellationToken,
}

/// What the dispatcher did before it exited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub completed: usize,
    pub failed: usize,
    /// Not found, already claimed, or dropped at shutdown before starting.
    pub skipped: usize,
    /// Still running when the drain deadline passed.
    pub abandoned: usize,
}

impl DrainReport {
    fn record(&mut self, outcome: Option<JobOutcome>) {
        match outcome {
            Some(JobOutcome::Completed) => self.completed += 1,
            Some(JobOutcome::Failed { .. }) => self.failed += 1,
            Some(JobOutcome::NotFound | JobOutcome::Skipped) | None => self.skipped += 1,
        }
    }
}

impl JobQueue {
    /// Start the dispatcher with `workers` concurrent jobs (at least one).
    pub fn start(
        orchestrator: Orchestrator,
        workers: usize,
        cancel: CancellationToken,
    ) -> (Self, QueueHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let in_flight = InFlight::default();
        let dispatcher = tokio::spawn(dispatch(
            orchestrator,
            rx,
            in_flight.clone(),
            workers.max(1),
            cancel.clone(),
        ));
        (Self { tx, in_flight }, QueueHandle { dispatcher, cancel })
    }

    /// Enqueue a generation job. Returns `false` if the dispatcher is gone.
    pub fn submit(&self, plan_id: Uuid) -> bool {
        let mut map = lock(&self.in_flight);
        self.enqueue(&mut map, plan_id)
    }

    /// Enqueue a job unless one for `plan_id` is already waiting or running.
    /// Returns `true` only when a new job was queued.
    pub fn submit_new(&self, plan_id: Uuid) -> bool {
        let mut map = lock(&self.in_flight);
        if map.contains_key(&plan_id) {
            tracing::debug!(plan_id = %plan_id, "generation job already queued");
            return false;
        }
        self.enqueue(&mut map, plan_id)
    }

    /// Whether a job for `plan_id` is waiting or running.
    pub fn is_queued(&self, plan_id: Uuid) -> bool {
        lock(&self.in_flight).contains_key(&plan_id)
    }

    fn enqueue(&self, map: &mut HashMap<Uuid, usize>, plan_id: Uuid) -> bool {
        match self.tx.send(plan_id) {
            Ok(()) => {
                *map.entry(plan_id).or_insert(0) += 1;
                tracing::debug!(plan_id = %plan_id, "generation job submitted");
                true
            }
            Err(_) => {
                tracing::warn!(plan_id = %plan_id, "job queue closed, submission dropped");
                false
            }
        }
    }
}

impl QueueHandle {
    /// Cancel and wait for the drain.
    pub async fn shutdown(self) -> DrainReport {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the dispatcher to exit on its own.
    pub async fn join(self) -> DrainReport {
        match self.dispatcher.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "job dispatcher panicked");
                DrainReport::default()
            }
        }
    }
}

async fn dispatch(
    orchestrator: Orchestrator,
    mut rx: mpsc::UnboundedReceiver<Uuid>,
    in_flight: InFlight,
    workers: usize,
    cancel: CancellationToken,
) -> DrainReport {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut jobs: JoinSet<Option<JobOutcome>> = JoinSet::new();
    let mut report = DrainReport::default();

    tracing::info!(workers, "job queue started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(done) = jobs.join_next(), if !jobs.is_empty() => {
                report.record(done.unwrap_or_else(|e| {
                    tracing::error!(error = %e, "generation job panicked");
                    None
                }));
            }
            next = rx.recv() => match next {
                Some(plan_id) => {
                    let orchestrator = orchestrator.clone();
                    let semaphore = semaphore.clone();
                    let cancel = cancel.clone();
                    let guard = InFlightGuard {
                        in_flight: in_flight.clone(),
                        plan_id,
                    };
                    jobs.spawn(async move {
                        let _guard = guard;
                        let _permit = semaphore.acquire_owned().await.ok()?;
                        if cancel.is_cancelled() {
                            return None;
                        }
                        Some(orchestrator.run(plan_id).await)
                    });
                }
                None => {
                    while let Some(done) = jobs.join_next().await {
                        report.record(done.unwrap_or(None));
                    }
                    tracing::info!(?report, "job queue closed");
                    return report;
                }
            },
        }
    }

    tracing::info!(in_flight = jobs.len(), "job queue cancelled, draining in-flight jobs");
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while !jobs.is_empty() {
        match tokio::time::timeout_at(deadline, jobs.join_next()).await {
            Ok(Some(done)) => report.record(done.unwrap_or(None)),
            Ok(None) => break,
            Err(_) => {
                report.abandoned = jobs.len();
                tracing::warn!(
                    remaining = report.abandoned,
                    "drain timeout expired, aborting {} jobs",
                    report.abandoned
                );
                jobs.abort_all();
                break;
            }
        }
    }
    report
}

/// Plans touched by [`recover`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub failed: Vec<Uuid>,
    pub resubmitted: Vec<Uuid>,
}

/// Startup recovery: fail plans orphaned in `generating`, resubmit `pending`
/// ones.
pub async fn recover(pool: &PgPool, queue: &JobQueue) -> Result<RecoveryReport> {
    let (payload, summary): (Value, String) = failure_record(ORPHANED_PLAN_MESSAGE);

    let orphaned = plan_db::fail_orphaned_plans(pool, &payload, &summary).await?;
    for plan in &orphaned {
        tracing::warn!(plan_id = %plan.id, "failed plan orphaned in generating state");
    }

    let resubmitted = submit_pending(pool, queue).await?;

    Ok(RecoveryReport {
        failed: orphaned.into_iter().map(|p| p.id).collect(),
        resubmitted,
    })
}

/// Submit every `pending` plan not already queued, oldest first.
pub async fn submit_pending(pool: &PgPool, queue: &JobQueue) -> Result<Vec<Uuid>> {
    let pending = plan_db::list_plans_by_status(pool, PlanStatus::Pending).await?;
    let mut submitted = Vec::with_capacity(pending.len());
    for plan in &pending {
        if queue.submit_new(plan.id) {
            submitted.push(plan.id);
        }
    }
    if !submitted.is_empty() {
        tracing::info!(count = submitted.len(), "submitted pending plans");
    }
    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_outcomes() {
        let mut report = DrainReport::default();
        report.record(Some(JobOutcome::Completed));
        report.record(Some(JobOutcome::Failed {
            message: "x".to_string(),
        }));
        report.record(Some(JobOutcome::NotFound));
        report.record(None);
        assert_eq!(
            report,
            DrainReport {
                completed: 1,
                failed: 1,
                skipped: 2,
                abandoned: 0
            }
        );
    }
}
