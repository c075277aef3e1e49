use chrono::{DateTime, Utc};
use database::common::{RetryConfig, retry_retryable};
use observability::IndexingMetrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::chunker::{TextChunk, TextChunker};
use crate::embedding::EmbeddingProvider;
use crate::error::{IndexerError, IndexerResult};
use crate::models::{IndexRunReport, NormalizedTicket, RunOutcome, TicketChunk};
use crate::normalizer::{normalize_ticket, ticket_url};
use crate::repository::ChunkRepository;
use crate::watermark::WatermarkStore;
use crate::zendesk::TicketSource;

/// Snapshot reported by the `status` command
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub watermark: Option<DateTime<Utc>>,
    pub chunk_count: usize,
}

/// What happened to one ticket during a run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct TicketOutcome {
    chunks_written: usize,
    chunks_failed: usize,
    chunks_pruned: usize,
    failed: bool,
}

/// Orchestrates fetch, normalize, chunk, embed and upsert for one run
///
/// Tickets are processed one at a time. Per-ticket and per-chunk failures are logged
/// and counted; only a failed ticket search aborts the run.
pub struct IndexingService {
    source: Arc<dyn TicketSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    repository: Arc<dyn ChunkRepository>,
    watermark: Arc<dyn WatermarkStore>,
    chunker: TextChunker,
    retry: RetryConfig,
}

impl IndexingService {
    pub fn new(
        source: Arc<dyn TicketSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        repository: Arc<dyn ChunkRepository>,
        watermark: Arc<dyn WatermarkStore>,
    ) -> Self {
        Self {
            source,
            embedder,
            repository,
            watermark,
            chunker: TextChunker::default(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Current watermark and stored row count
    pub async fn status(&self) -> IndexerResult<IndexStatus> {
        Ok(IndexStatus {
            watermark: self.watermark.load().await?,
            chunk_count: self.repository.count_chunks().await?,
        })
    }

    /// Run one indexing pass
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> IndexRunReport {
        let started = Instant::now();
        let started_at = Utc::now();

        let watermark_before = match self.watermark.load().await {
            Ok(watermark) => watermark,
            Err(e) => return self.abort(IndexRunReport::new(started_at, None), started, e),
        };
        let mut report = IndexRunReport::new(started_at, watermark_before);

        info!(
            since = ?watermark_before,
            chunk_size = self.chunker.chunk_size(),
            chunk_overlap = self.chunker.overlap(),
            "Starting indexing run"
        );

        // The source retries each page itself
        let tickets = match self.source.fetch_updated_since(watermark_before).await {
            Ok(tickets) => tickets,
            Err(e) => return self.abort(report, started, e),
        };

        report.tickets_fetched = tickets.len();
        let base_url = self.source.ticket_base_url();
        let mut settled: Vec<(DateTime<Utc>, bool)> = Vec::with_capacity(tickets.len());

        for mut raw in tickets {
            match self.source.fetch_comments(raw.id).await {
                Ok(comments) => raw.comments = comments,
                Err(e) => {
                    error!(
                        url = %ticket_url(&base_url, raw.id),
                        error = %e,
                        "Failed to fetch ticket comments, skipping"
                    );
                    report.tickets_failed += 1;
                    IndexingMetrics::record_ticket_failed(0, 0);
                    settled.push((raw.updated_at, true));
                    continue;
                }
            }

            let outcome = match normalize_ticket(&raw, &base_url) {
                Some(ticket) => {
                    let outcome = self.index_ticket(&ticket, started_at).await;
                    if outcome.failed {
                        report.tickets_failed += 1;
                        IndexingMetrics::record_ticket_failed(
                            outcome.chunks_written,
                            outcome.chunks_failed,
                        );
                    } else {
                        report.tickets_indexed += 1;
                        IndexingMetrics::record_ticket_indexed(outcome.chunks_written);
                    }
                    outcome
                }
                None => {
                    let url = ticket_url(&base_url, raw.id);
                    debug!(url = %url, "Ticket has no text, skipping");
                    let outcome = self.clear_ticket(&url).await;
                    if outcome.failed {
                        report.tickets_failed += 1;
                    } else {
                        report.tickets_skipped += 1;
                        IndexingMetrics::record_ticket_skipped();
                    }
                    outcome
                }
            };

            report.chunks_written += outcome.chunks_written;
            report.chunks_failed += outcome.chunks_failed;
            report.chunks_pruned += outcome.chunks_pruned;
            IndexingMetrics::record_chunks_pruned(outcome.chunks_pruned);
            settled.push((raw.updated_at, outcome.failed));
        }

        let advanced = advance_watermark(watermark_before, &settled);
        if advanced != watermark_before {
            if let Some(watermark) = advanced {
                match self.watermark.save(watermark).await {
                    Ok(()) => {
                        report.watermark_after = advanced;
                        IndexingMetrics::set_watermark(watermark.timestamp());
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to save watermark");
                        report.error = Some(format!("watermark not saved: {}", e));
                    }
                }
            }
        }

        report.outcome = RunOutcome::Completed;
        report.duration_ms = started.elapsed().as_millis() as u64;
        IndexingMetrics::record_run_completed(
            report.tickets_fetched,
            report.chunks_written,
            report.duration_ms,
        );

        info!(
            fetched = report.tickets_fetched,
            indexed = report.tickets_indexed,
            skipped = report.tickets_skipped,
            failed = report.tickets_failed,
            chunks_written = report.chunks_written,
            chunks_failed = report.chunks_failed,
            chunks_pruned = report.chunks_pruned,
            watermark = ?report.watermark_after,
            duration_ms = report.duration_ms,
            "Indexing run completed"
        );
        report
    }

    fn abort(&self, mut report: IndexRunReport, started: Instant, err: IndexerError) -> IndexRunReport {
        report.outcome = RunOutcome::Aborted;
        report.duration_ms = started.elapsed().as_millis() as u64;
        report.error = Some(err.to_string());
        IndexingMetrics::record_run_aborted(&err.to_string(), report.duration_ms);
        error!(error = %err, "Indexing run aborted");
        report
    }

    /// Chunk, embed, upsert and prune one ticket
    async fn index_ticket(
        &self,
        ticket: &NormalizedTicket,
        indexed_at: DateTime<Utc>,
    ) -> TicketOutcome {
        let chunks = self.chunker.chunk(&ticket.body);
        let total = chunks.len();
        let embeddings = self.embed_chunks(&ticket.url, &chunks).await;
        let dimension = self.embedder.dimension();

        let mut outcome = TicketOutcome::default();
        let mut rows = Vec::with_capacity(total);
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            match embedding {
                // The vector column rejects any other length
                Some(embedding) if embedding.len() != dimension => {
                    error!(
                        url = %ticket.url,
                        chunk_number = chunk.index,
                        expected = dimension,
                        got = embedding.len(),
                        "Embedding has the wrong dimension, skipping chunk"
                    );
                    outcome.chunks_failed += 1;
                }
                Some(embedding) => rows.push(TicketChunk::new(
                    ticket,
                    chunk.index,
                    total,
                    self.chunker.chunk_size(),
                    chunk.content,
                    embedding,
                    indexed_at,
                )),
                None => outcome.chunks_failed += 1,
            }
        }

        let (written, store_failed) = self.store_rows(&rows).await;
        outcome.chunks_written = written;
        outcome.chunks_failed += store_failed;

        if outcome.chunks_failed > 0 {
            warn!(
                url = %ticket.url,
                written = outcome.chunks_written,
                failed = outcome.chunks_failed,
                "Ticket partially indexed"
            );
            outcome.failed = true;
            return outcome;
        }

        match self.prune(&ticket.url, total as i32).await {
            Ok(pruned) => outcome.chunks_pruned = pruned,
            Err(_) => outcome.failed = true,
        }

        debug!(url = %ticket.url, chunks = total, "Ticket indexed");
        outcome
    }

    /// Drop every row of a ticket that no longer has text
    async fn clear_ticket(&self, url: &str) -> TicketOutcome {
        match self.prune(url, 0).await {
            Ok(pruned) => TicketOutcome {
                chunks_pruned: pruned,
                ..TicketOutcome::default()
            },
            Err(_) => TicketOutcome {
                failed: true,
                ..TicketOutcome::default()
            },
        }
    }

    async fn prune(&self, url: &str, first_stale: i32) -> IndexerResult<usize> {
        let result = retry_retryable(&self.retry, "chunks.prune", || {
            self.repository.delete_chunks_from(url, first_stale)
        })
        .await;

        match &result {
            Ok(pruned) if *pruned > 0 => {
                info!(url = %url, pruned = *pruned, "Pruned stale chunks")
            }
            Ok(_) => {}
            Err(e) => error!(url = %url, error = %e, "Failed to prune stale chunks"),
        }
        result
    }

    /// One batched call per ticket, falling back to one call per chunk
    ///
    /// Returns one entry per chunk; `None` marks a chunk that could not be embedded.
    async fn embed_chunks(&self, url: &str, chunks: &[TextChunk]) -> Vec<Option<Vec<f32>>> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let batch = retry_retryable(&self.retry, "embeddings.batch", || {
            self.embedder.embed_batch(&texts)
        })
        .await;

        match batch {
            Ok(vectors) if vectors.len() == chunks.len() => {
                IndexingMetrics::record_embedding_request("batch", true);
                return vectors.into_iter().map(Some).collect();
            }
            Ok(vectors) => {
                IndexingMetrics::record_embedding_request("batch", false);
                warn!(
                    url = %url,
                    expected = chunks.len(),
                    got = vectors.len(),
                    "Batch embedding returned wrong count, falling back to single requests"
                );
            }
            Err(IndexerError::Authentication(msg)) => {
                IndexingMetrics::record_embedding_request("batch", false);
                error!(url = %url, error = %msg, "Embedding provider rejected credentials");
                return vec![None; chunks.len()];
            }
            Err(e) => {
                IndexingMetrics::record_embedding_request("batch", false);
                warn!(
                    url = %url,
                    error = %e,
                    "Batch embedding failed, falling back to single requests"
                );
            }
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let result = retry_retryable(&self.retry, "embeddings.single", || {
                self.embedder.embed(&chunk.content)
            })
            .await;

            match result {
                Ok(vector) => {
                    IndexingMetrics::record_embedding_request("single", true);
                    embeddings.push(Some(vector));
                }
                Err(e) => {
                    IndexingMetrics::record_embedding_request("single", false);
                    error!(
                        url = %url,
                        chunk_number = chunk.index,
                        error = %e,
                        "Failed to embed chunk, skipping"
                    );
                    embeddings.push(None);
                }
            }
        }
        embeddings
    }

    /// Upsert rows as one batch, falling back to one row at a time
    ///
    /// Returns `(written, failed)`.
    async fn store_rows(&self, rows: &[TicketChunk]) -> (usize, usize) {
        if rows.is_empty() {
            return (0, 0);
        }

        match retry_retryable(&self.retry, "chunks.upsert", || {
            self.repository.upsert_chunks(rows)
        })
        .await
        {
            Ok(_) => return (rows.len(), 0),
            Err(e) => warn!(
                url = %rows[0].url,
                error = %e,
                "Batch upsert failed, retrying row by row"
            ),
        }

        let mut written = 0;
        let mut failed = 0;
        for row in rows {
            match retry_retryable(&self.retry, "chunks.upsert_one", || {
                self.repository.upsert_chunks(std::slice::from_ref(row))
            })
            .await
            {
                Ok(_) => written += 1,
                Err(e) => {
                    error!(
                        url = %row.url,
                        chunk_number = row.chunk_number,
                        error = %e,
                        "Failed to store chunk, skipping"
                    );
                    failed += 1;
                }
            }
        }
        (written, failed)
    }
}

/// Next watermark after a run
///
/// `settled` holds `(updated_at, failed)` for every fetched ticket. The watermark moves
/// to the newest successful ticket strictly older than the oldest failed one, so failed
/// tickets are fetched again next run. It never moves backwards.
pub fn advance_watermark(
    before: Option<DateTime<Utc>>,
    settled: &[(DateTime<Utc>, bool)],
) -> Option<DateTime<Utc>> {
    let oldest_failed = settled
        .iter()
        .filter(|(_, failed)| *failed)
        .map(|(updated_at, _)| *updated_at)
        .min();

    let newest_settled = settled
        .iter()
        .filter(|(updated_at, failed)| {
            !*failed && oldest_failed.is_none_or(|limit| *updated_at < limit)
        })
        .map(|(updated_at, _)| *updated_at)
        .max();

    match (before, newest_settled) {
        (Some(before), Some(newest)) => Some(before.max(newest)),
        (before, newest) => before.or(newest),
    }
}
