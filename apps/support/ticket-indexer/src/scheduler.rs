//! Cron-driven runs

use domain_tickets::IndexingService;
use eyre::Result;
use observability::IndexingMetrics;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// Run `f` unless another run holds `guard`
///
/// Returns `None` when the trigger was skipped.
pub async fn run_exclusive<F, Fut, T>(guard: &Mutex<()>, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let Ok(_running) = guard.try_lock() else {
        warn!("Previous indexing run still in progress, skipping this trigger");
        IndexingMetrics::record_run_skipped();
        return None;
    };
    Some(f().await)
}

/// Run the indexer on `cron_expr` until Ctrl-C
pub async fn run_scheduled(service: Arc<IndexingService>, cron_expr: &str) -> Result<()> {
    info!(cron = cron_expr, "Starting scheduled indexing");

    let mut sched = JobScheduler::new().await?;
    let guard = Arc::new(Mutex::new(()));

    let job = Job::new_async(cron_expr, move |_uuid, _l| {
        let service = service.clone();
        let guard = guard.clone();

        Box::pin(async move {
            info!("Running scheduled indexing");

            let Some(report) = run_exclusive(&guard, || service.run_once()).await else {
                return;
            };

            if report.is_completed() {
                info!(
                    fetched = report.tickets_fetched,
                    indexed = report.tickets_indexed,
                    failed = report.tickets_failed,
                    "Scheduled indexing complete"
                );
            } else {
                error!(error = ?report.error, "Scheduled indexing aborted");
            }
        })
    })?;

    sched.add(job).await?;
    sched.start().await?;

    info!("Scheduler started, waiting for jobs...");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down scheduler");
    sched.shutdown().await?;
    Ok(())
}
