use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Provenance tag written into every chunk's metadata
pub const SOURCE_TAG: &str = "zendesk";

/// Ticket as returned by the helpdesk search API, plus its comment bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTicket {
    pub id: u64,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub requester_id: Option<u64>,
    #[serde(default)]
    pub assignee_id: Option<u64>,
    #[serde(default)]
    pub organization_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Filled in per ticket from the comments endpoint during a run
    #[serde(default)]
    pub comments: Vec<String>,
}

/// Ticket metadata carried into every stored chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketMetadata {
    pub ticket_id: u64,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub tags: Vec<String>,
    pub requester: Option<u64>,
    pub assignee: Option<u64>,
    pub organization_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ticket reduced to what gets chunked and stored
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTicket {
    pub id: u64,
    pub url: String,
    pub title: String,
    pub body: String,
    pub metadata: TicketMetadata,
    pub updated_at: DateTime<Utc>,
}

/// One stored row of `zendesk_tickets`, keyed by `(url, chunk_number)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketChunk {
    pub url: String,
    pub chunk_number: i32,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub metadata: Value,
    pub embedding: Vec<f32>,
}

impl TicketChunk {
    /// Build the row for chunk `chunk_number` of `ticket`
    pub fn new(
        ticket: &NormalizedTicket,
        chunk_number: usize,
        total_chunks: usize,
        chunk_size: usize,
        content: String,
        embedding: Vec<f32>,
        indexed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: ticket.url.clone(),
            chunk_number: chunk_number as i32,
            title: ticket.title.clone(),
            summary: Some(ticket.title.clone()),
            content,
            metadata: chunk_metadata(&ticket.metadata, total_chunks, chunk_size, indexed_at),
            embedding,
        }
    }
}

/// JSON metadata blob: ticket metadata plus provenance
pub fn chunk_metadata(
    metadata: &TicketMetadata,
    total_chunks: usize,
    chunk_size: usize,
    indexed_at: DateTime<Utc>,
) -> Value {
    let mut value = serde_json::to_value(metadata).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut value {
        map.insert("source".to_string(), json!(SOURCE_TAG));
        map.insert("chunk_size".to_string(), json!(chunk_size));
        map.insert("total_chunks".to_string(), json!(total_chunks));
        map.insert("indexed_at".to_string(), json!(indexed_at.to_rfc3339()));
    }
    value
}

/// Terminal state of one indexing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every fetched ticket was attempted
    Completed,
    /// The fetch itself failed; nothing was written
    Aborted,
}

/// Summary of one indexing run
#[derive(Debug, Clone, Serialize)]
pub struct IndexRunReport {
    pub outcome: RunOutcome,
    pub tickets_fetched: usize,
    pub tickets_indexed: usize,
    pub tickets_skipped: usize,
    pub tickets_failed: usize,
    pub chunks_written: usize,
    pub chunks_failed: usize,
    pub chunks_pruned: usize,
    pub watermark_before: Option<DateTime<Utc>>,
    pub watermark_after: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexRunReport {
    pub fn new(started_at: DateTime<Utc>, watermark_before: Option<DateTime<Utc>>) -> Self {
        Self {
            outcome: RunOutcome::Completed,
            tickets_fetched: 0,
            tickets_indexed: 0,
            tickets_skipped: 0,
            tickets_failed: 0,
            chunks_written: 0,
            chunks_failed: 0,
            chunks_pruned: 0,
            watermark_before,
            watermark_after: watermark_before,
            duration_ms: 0,
            started_at,
            error: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}
