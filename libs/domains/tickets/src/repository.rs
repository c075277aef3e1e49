use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::IndexerResult;
use crate::models::TicketChunk;

/// Destination table name
pub const CHUNKS_TABLE: &str = "zendesk_tickets";

/// One row per synced table, holding the watermark of the last run
pub const SYNC_STATE_TABLE: &str = "zendesk_sync_state";

/// Repository trait for chunk persistence
///
/// Rows are keyed by `(url, chunk_number)`. Implementations write rows
/// independently, so a failed call never corrupts rows written earlier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Insert or overwrite each chunk; returns the number of rows written
    async fn upsert_chunks(&self, chunks: &[TicketChunk]) -> IndexerResult<usize>;

    /// Delete rows of `url` with `chunk_number >= first_stale_chunk`
    async fn delete_chunks_from(&self, url: &str, first_stale_chunk: i32) -> IndexerResult<usize>;

    /// Watermark saved by the last run, `None` before the first save
    async fn load_sync_watermark(&self) -> IndexerResult<Option<DateTime<Utc>>>;

    /// Overwrite the saved watermark
    async fn save_sync_watermark(&self, watermark: DateTime<Utc>) -> IndexerResult<()>;

    /// Count all stored chunk rows
    async fn count_chunks(&self) -> IndexerResult<usize>;
}

/// pgvector text literal, e.g. `[0.1,0.2]`
pub fn vector_literal(values: &[f32]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal() {
        assert_eq!(vector_literal(&[]), "[]");
        assert_eq!(vector_literal(&[0.5, -1.0, 2.25]), "[0.5,-1,2.25]");
    }
}
