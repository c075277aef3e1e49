//! In-process fakes for pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use domain_tickets::{
    ChunkRepository, EmbeddingProvider, IndexerError, IndexerResult, RawTicket, TicketChunk,
    TicketSource,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

pub const TICKET_BASE_URL: &str = "https://example.zendesk.com/tickets";
pub const DIMENSION: usize = 1536;

/// Fixed point in time so watermarks are easy to reason about
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub fn raw_ticket(id: u64, body: &str, updated_at: DateTime<Utc>) -> RawTicket {
    RawTicket {
        id,
        subject: Some(format!("Ticket {}", id)),
        description: Some(body.to_string()),
        status: Some("solved".to_string()),
        priority: Some("normal".to_string()),
        tags: vec!["billing".to_string()],
        requester_id: Some(11),
        assignee_id: Some(22),
        organization_id: None,
        created_at: at(-60),
        updated_at,
        comments: Vec::new(),
    }
}

/// Helpdesk whose tickets can be swapped between runs
///
/// Comments are served by `fetch_comments`, like the real API.
#[derive(Default)]
pub struct FakeTicketSource {
    tickets: Mutex<Vec<RawTicket>>,
    calls: Mutex<Vec<Option<DateTime<Utc>>>>,
    missing_comments: Mutex<HashSet<u64>>,
}

impl FakeTicketSource {
    pub fn new(tickets: Vec<RawTicket>) -> Self {
        Self {
            tickets: Mutex::new(tickets),
            ..Self::default()
        }
    }

    /// Make the comments endpoint of `id` answer 404
    pub fn fail_comments_for(&self, id: u64) {
        self.missing_comments.lock().unwrap().insert(id);
    }

    pub fn restore_comments_for(&self, id: u64) {
        self.missing_comments.lock().unwrap().remove(&id);
    }

    /// Replace a ticket with the same id, or add it
    pub fn upsert(&self, ticket: RawTicket) {
        let mut tickets = self.tickets.lock().unwrap();
        tickets.retain(|t| t.id != ticket.id);
        tickets.push(ticket);
    }

    /// `since` argument of every fetch so far
    pub fn calls(&self) -> Vec<Option<DateTime<Utc>>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TicketSource for FakeTicketSource {
    async fn fetch_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> IndexerResult<Vec<RawTicket>> {
        self.calls.lock().unwrap().push(since);
        let mut tickets: Vec<RawTicket> = self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| since.is_none_or(|s| t.updated_at > s))
            .map(|t| RawTicket {
                comments: Vec::new(),
                ..t.clone()
            })
            .collect();
        tickets.sort_by_key(|t| t.updated_at);
        Ok(tickets)
    }

    async fn fetch_comments(&self, ticket_id: u64) -> IndexerResult<Vec<String>> {
        if self.missing_comments.lock().unwrap().contains(&ticket_id) {
            return Err(IndexerError::Api("404 Not Found".to_string()));
        }
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == ticket_id)
            .map(|t| t.comments.clone())
            .unwrap_or_default())
    }

    fn ticket_base_url(&self) -> String {
        TICKET_BASE_URL.to_string()
    }
}

/// Embeds text as a vector derived from its length and first byte
pub struct DeterministicEmbedder;

impl DeterministicEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSION];
        vector[0] = text.chars().count() as f32;
        vector[1] = text.bytes().next().unwrap_or(0) as f32;
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbedder {
    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed(&self, text: &str) -> IndexerResult<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> IndexerResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Fails every chunk whose text starts with `prefix`
pub struct RejectingEmbedder {
    pub prefix: &'static str,
}

#[async_trait]
impl EmbeddingProvider for RejectingEmbedder {
    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed(&self, text: &str) -> IndexerResult<Vec<f32>> {
        if text.starts_with(self.prefix) {
            return Err(IndexerError::EmbeddingApi("400 Bad Request".to_string()));
        }
        DeterministicEmbedder.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> IndexerResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Store keyed by `(url, chunk_number)`, mirroring the table's unique index
#[derive(Default)]
pub struct InMemoryChunkRepository {
    rows: Mutex<BTreeMap<(String, i32), TicketChunk>>,
    upserts: Mutex<usize>,
    sync_watermark: Mutex<Option<DateTime<Utc>>>,
}

impl InMemoryChunkRepository {
    pub fn rows_for(&self, url: &str) -> Vec<TicketChunk> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Number of upsert calls received
    pub fn upsert_calls(&self) -> usize {
        *self.upserts.lock().unwrap()
    }
}

#[async_trait]
impl ChunkRepository for InMemoryChunkRepository {
    async fn upsert_chunks(&self, chunks: &[TicketChunk]) -> IndexerResult<usize> {
        *self.upserts.lock().unwrap() += 1;
        let mut rows = self.rows.lock().unwrap();
        for chunk in chunks {
            rows.insert((chunk.url.clone(), chunk.chunk_number), chunk.clone());
        }
        Ok(chunks.len())
    }

    async fn delete_chunks_from(&self, url: &str, first_stale_chunk: i32) -> IndexerResult<usize> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|(row_url, n), _| !(row_url == url && *n >= first_stale_chunk));
        Ok(before - rows.len())
    }

    async fn load_sync_watermark(&self) -> IndexerResult<Option<DateTime<Utc>>> {
        Ok(*self.sync_watermark.lock().unwrap())
    }

    async fn save_sync_watermark(&self, watermark: DateTime<Utc>) -> IndexerResult<()> {
        *self.sync_watermark.lock().unwrap() = Some(watermark);
        Ok(())
    }

    async fn count_chunks(&self) -> IndexerResult<usize> {
        Ok(self.len())
    }
}
