//! Observability utilities for the ticket indexing job.
//!
//! This crate provides:
//! - Prometheus metrics recorder installation (optionally with an HTTP scrape listener)
//! - Indexing metrics: tickets, chunks, embeddings and run durations
//!
//! Recording a metric before `init_metrics` is a no-op, so libraries can record
//! unconditionally and tests need no recorder.
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, IndexingMetrics};
//!
//! init_metrics(Some("0.0.0.0:9100".parse()?))?;
//! IndexingMetrics::record_ticket_indexed(3);
//! ```

pub mod indexing;

pub use indexing::IndexingMetrics;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tracing::info;

static METRICS_HANDLE: OnceCell<Option<PrometheusHandle>> = OnceCell::new();

/// Install the Prometheus metrics recorder.
///
/// With `listen_addr`, the exporter also serves `/metrics` on that address (needs a
/// Tokio runtime). Without it, metrics are kept in-process and can be rendered with
/// [`render_metrics`]. Only the first call installs anything.
pub fn init_metrics(listen_addr: Option<SocketAddr>) -> Result<(), BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = match listen_addr {
            Some(addr) => {
                PrometheusBuilder::new().with_http_listener(addr).install()?;
                info!(%addr, "Prometheus metrics listener started");
                None
            }
            None => {
                let handle = PrometheusBuilder::new().install_recorder()?;
                info!("Prometheus metrics recorder initialized");
                Some(handle)
            }
        };

        register_metric_descriptions();
        Ok::<_, BuildError>(handle)
    })?;

    Ok(())
}

/// Render the in-process metrics, if a recorder without listener was installed
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE
        .get()
        .and_then(|handle| handle.as_ref())
        .map(|handle| handle.render())
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    describe_counter!(
        "indexer_runs_total",
        "Indexing runs by outcome (completed, aborted, skipped)"
    );
    describe_histogram!(
        "indexer_run_duration_seconds",
        "Wall-clock duration of an indexing run"
    );
    describe_counter!(
        "indexer_tickets_total",
        "Tickets handled by status (indexed, skipped, failed)"
    );
    describe_counter!(
        "indexer_chunks_total",
        "Chunks handled by status (written, failed, pruned)"
    );
    describe_counter!(
        "indexer_embedding_requests_total",
        "Embedding API requests by mode (batch, single) and status"
    );
    describe_gauge!(
        "indexer_tickets_fetched_last_run",
        "Tickets returned by the helpdesk in the last run"
    );
    describe_gauge!(
        "indexer_watermark_timestamp_seconds",
        "Unix timestamp of the current sync watermark"
    );
}
