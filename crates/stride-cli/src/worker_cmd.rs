//! `stride worker`: run the generation queue without the HTTP API.
//!
//! Also holds the queue bootstrap shared with `stride serve`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use stride_core::generator::AnthropicGenerator;
use stride_core::orchestrator::{Orchestrator, PgPlanStore};
use stride_core::plan::ProfileDefaults;
use stride_core::queue::{self, DrainReport, JobQueue, QueueHandle};

use crate::config::StrideConfig;

/// Build the Postgres-backed orchestrator for the resolved config.
pub fn build_orchestrator(pool: PgPool, config: &StrideConfig) -> Orchestrator {
    Orchestrator::new(
        Arc::new(PgPlanStore::new(pool)),
        Arc::new(AnthropicGenerator::new(config.generator.clone())),
        ProfileDefaults::default(),
    )
}

/// Start the job queue and run startup recovery against it.
pub async fn start_queue(
    pool: &PgPool,
    config: &StrideConfig,
    cancel: CancellationToken,
) -> Result<(JobQueue, QueueHandle)> {
    let orchestrator = build_orchestrator(pool.clone(), config);
    let (job_queue, handle) = JobQueue::start(orchestrator, config.workers, cancel);

    match queue::recover(pool, &job_queue).await {
        Ok(report) => {
            tracing::info!(
                orphaned = report.failed.len(),
                resubmitted = report.resubmitted.len(),
                workers = config.workers,
                model = %config.generator.model,
                "job queue started"
            );
            Ok((job_queue, handle))
        }
        Err(e) => {
            handle.shutdown().await;
            Err(e)
        }
    }
}

pub fn log_drain(report: &DrainReport) {
    tracing::info!(
        completed = report.completed,
        failed = report.failed,
        skipped = report.skipped,
        abandoned = report.abandoned,
        "job queue drained"
    );
}

/// Run until Ctrl+C, picking up pending plans every `poll` interval.
pub async fn run_worker(pool: &PgPool, config: &StrideConfig, poll: Duration) -> Result<()> {
    let cancel = CancellationToken::new();
    let (job_queue, handle) = start_queue(pool, config, cancel.clone()).await?;

    let mut ticker = tokio::time::interval(poll);
    // The first tick fires immediately and recovery already submitted.
    ticker.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "failed to listen for Ctrl+C");
                }
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = queue::submit_pending(pool, &job_queue).await {
                    tracing::warn!(error = %format!("{e:#}"), "failed to poll for pending plans");
                }
            }
        }
    }

    tracing::info!("shutting down, waiting for running jobs");
    let report = handle.shutdown().await;
    log_drain(&report);
    println!(
        "Worker stopped: {} completed, {} failed, {} skipped, {} abandoned.",
        report.completed, report.failed, report.skipped, report.abandoned
    );
    Ok(())
}
