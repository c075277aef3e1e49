//! Ticket indexing metrics.

use metrics::{counter, gauge, histogram};

/// Indexing metrics recorder
pub struct IndexingMetrics;

impl IndexingMetrics {
    // =========================================================================
    // Run Metrics
    // =========================================================================

    /// Record a run that walked every fetched ticket
    pub fn record_run_completed(tickets_fetched: usize, chunks_written: usize, duration_ms: u64) {
        counter!("indexer_runs_total", "outcome" => "completed").increment(1);
        histogram!("indexer_run_duration_seconds", "outcome" => "completed")
            .record(duration_ms as f64 / 1000.0);
        gauge!("indexer_tickets_fetched_last_run").set(tickets_fetched as f64);

        tracing::debug!(
            tickets_fetched = tickets_fetched,
            chunks_written = chunks_written,
            duration_ms = duration_ms,
            "Recorded completed run"
        );
    }

    /// Record a run aborted before any write, e.g. because the ticket fetch failed
    pub fn record_run_aborted(reason: &str, duration_ms: u64) {
        counter!("indexer_runs_total", "outcome" => "aborted").increment(1);
        histogram!("indexer_run_duration_seconds", "outcome" => "aborted")
            .record(duration_ms as f64 / 1000.0);

        tracing::debug!(reason = reason, duration_ms = duration_ms, "Recorded aborted run");
    }

    /// Record a scheduler trigger dropped because a run was still in progress
    pub fn record_run_skipped() {
        counter!("indexer_runs_total", "outcome" => "skipped").increment(1);
    }

    // =========================================================================
    // Ticket / Chunk Metrics
    // =========================================================================

    /// Record a ticket whose chunks were all written
    pub fn record_ticket_indexed(chunks: usize) {
        counter!("indexer_tickets_total", "status" => "indexed").increment(1);
        counter!("indexer_chunks_total", "status" => "written").increment(chunks as u64);
    }

    /// Record a ticket with nothing to index
    pub fn record_ticket_skipped() {
        counter!("indexer_tickets_total", "status" => "skipped").increment(1);
    }

    /// Record a ticket where at least one chunk could not be embedded or stored
    pub fn record_ticket_failed(chunks_written: usize, chunks_failed: usize) {
        counter!("indexer_tickets_total", "status" => "failed").increment(1);
        counter!("indexer_chunks_total", "status" => "written").increment(chunks_written as u64);
        counter!("indexer_chunks_total", "status" => "failed").increment(chunks_failed as u64);
    }

    /// Record stale chunk rows removed after a ticket shrank
    pub fn record_chunks_pruned(count: usize) {
        if count > 0 {
            counter!("indexer_chunks_total", "status" => "pruned").increment(count as u64);
        }
    }

    // =========================================================================
    // Embedding Metrics
    // =========================================================================

    /// Record one embedding API call; `mode` is "batch" or "single"
    pub fn record_embedding_request(mode: &'static str, success: bool) {
        let status = if success { "success" } else { "error" };
        counter!("indexer_embedding_requests_total", "mode" => mode, "status" => status)
            .increment(1);
    }

    // =========================================================================
    // Gauge Metrics (Current State)
    // =========================================================================

    /// Set the sync watermark as a unix timestamp
    pub fn set_watermark(unix_seconds: i64) {
        gauge!("indexer_watermark_timestamp_seconds").set(unix_seconds as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder every call is a no-op; these guard against panics
    // in label handling.
    #[test]
    fn test_recording_without_recorder() {
        IndexingMetrics::record_run_completed(3, 7, 1200);
        IndexingMetrics::record_run_aborted("fetch failed", 15);
        IndexingMetrics::record_run_skipped();
        IndexingMetrics::record_ticket_indexed(2);
        IndexingMetrics::record_ticket_skipped();
        IndexingMetrics::record_ticket_failed(1, 1);
        IndexingMetrics::record_chunks_pruned(0);
        IndexingMetrics::record_embedding_request("batch", true);
        IndexingMetrics::set_watermark(1_700_000_000);
    }
}
