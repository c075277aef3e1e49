//! Supabase REST (PostgREST) implementation of [`ChunkRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{IndexerError, IndexerResult, parse_retry_after};
use crate::models::TicketChunk;
use crate::repository::{CHUNKS_TABLE, ChunkRepository, SYNC_STATE_TABLE};
use crate::zendesk::DEFAULT_HTTP_TIMEOUT_SECS;

/// Supabase project connection settings
#[derive(Clone)]
pub struct PostgrestConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    pub url: String,
    pub service_key: String,
    pub timeout: Duration,
}

impl PostgrestConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_key: service_key.into(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn table_url(&self) -> String {
        self.rest_url(CHUNKS_TABLE)
    }

    fn sync_state_url(&self) -> String {
        self.rest_url(SYNC_STATE_TABLE)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), table)
    }
}

impl fmt::Debug for PostgrestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgrestConfig")
            .field("url", &self.url)
            .field("service_key", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct PostgrestChunkRepository {
    client: Client,
    config: PostgrestConfig,
}

#[derive(Debug, Deserialize)]
struct DeletedRow {
    #[allow(dead_code)]
    id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SyncStateRow {
    #[serde(default, skip_deserializing)]
    name: String,
    last_synced_at: DateTime<Utc>,
}

impl PostgrestChunkRepository {
    pub fn new(config: PostgrestConfig) -> IndexerResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.service_key)
            .map_err(|_| IndexerError::Configuration("invalid service key".to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.service_key))
            .map_err(|_| IndexerError::Configuration("invalid service key".to_string()))?;
        headers.insert("apikey", key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| IndexerError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn send(&self, request: RequestBuilder) -> IndexerResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(IndexerError::from_status(
            status,
            retry_after,
            &body,
            IndexerError::Storage,
        ))
    }
}

/// Total from a PostgREST `Content-Range` header such as `0-0/42` or `*/0`
fn parse_content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl ChunkRepository for PostgrestChunkRepository {
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn upsert_chunks(&self, chunks: &[TicketChunk]) -> IndexerResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let request = self
            .client
            .post(self.config.table_url())
            .query(&[("on_conflict", "url,chunk_number")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(chunks);

        self.send(request).await?;
        debug!(written = chunks.len(), "Upserted chunks via PostgREST");
        Ok(chunks.len())
    }

    async fn delete_chunks_from(&self, url: &str, first_stale_chunk: i32) -> IndexerResult<usize> {
        let request = self
            .client
            .delete(self.config.table_url())
            .query(&[
                ("url", format!("eq.{}", url)),
                ("chunk_number", format!("gte.{}", first_stale_chunk)),
                ("select", "id".to_string()),
            ])
            .header("Prefer", "return=representation");

        let response = self.send(request).await?;
        let deleted: Vec<DeletedRow> = response
            .json()
            .await
            .map_err(|e| IndexerError::Storage(format!("Unexpected delete response: {}", e)))?;
        Ok(deleted.len())
    }

    async fn load_sync_watermark(&self) -> IndexerResult<Option<DateTime<Utc>>> {
        let request = self.client.get(self.config.sync_state_url()).query(&[
            ("select", "last_synced_at".to_string()),
            ("name", format!("eq.{}", CHUNKS_TABLE)),
        ]);

        let response = self.send(request).await?;
        let rows: Vec<SyncStateRow> = response
            .json()
            .await
            .map_err(|e| IndexerError::Storage(format!("Unexpected select response: {}", e)))?;
        Ok(rows.into_iter().next().map(|r| r.last_synced_at))
    }

    async fn save_sync_watermark(&self, watermark: DateTime<Utc>) -> IndexerResult<()> {
        let row = SyncStateRow {
            name: CHUNKS_TABLE.to_string(),
            last_synced_at: watermark,
        };
        let request = self
            .client
            .post(self.config.sync_state_url())
            .query(&[("on_conflict", "name")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row]);

        self.send(request).await?;
        debug!(watermark = %watermark, "Saved sync watermark via PostgREST");
        Ok(())
    }

    async fn count_chunks(&self) -> IndexerResult<usize> {
        let request = self
            .client
            .get(self.config.table_url())
            .query(&[("select", "id"), ("limit", "1")])
            .header("Prefer", "count=exact");

        let response = self.send(request).await?;
        response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| IndexerError::Storage("Missing Content-Range count".to_string()))
    }
}
