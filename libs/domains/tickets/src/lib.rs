//! Tickets Domain Library
//!
//! Indexes helpdesk tickets for similarity search: tickets are fetched from Zendesk,
//! normalized, split into chunks, embedded and upserted into the `zendesk_tickets`
//! pgvector table.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │ IndexingService  │  ← run_once(): one pass, one ticket at a time
//!                 └────────┬─────────┘
//!       ┌─────────────┬────┴────────┬──────────────────┐
//! ┌─────▼──────┐ ┌────▼──────────┐ ┌▼────────────────┐ ┌▼───────────────┐
//! │TicketSource│ │EmbeddingProv. │ │ ChunkRepository │ │ WatermarkStore │
//! │  (trait)   │ │   (trait)     │ │    (trait)      │ │    (trait)     │
//! └─────┬──────┘ └────┬──────────┘ └┬────────────────┘ └┬───────────────┘
//! ┌─────▼──────┐ ┌────▼──────────┐ ┌▼────────────────┐ ┌▼───────────────┐
//! │ZendeskClient│ │OpenAIProvider│ │PgChunkRepository│ │FileWatermark   │
//! └────────────┘ └───────────────┘ │PostgrestChunk.. │ │StoreWatermark  │
//!                                  └─────────────────┘ └────────────────┘
//! ```
//!
//! Between fetch and embed sit two pure steps: [`normalize_ticket`] and
//! [`TextChunker`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use core_config::FromEnv;
//! use database::common::RetryConfig;
//! use domain_tickets::{
//!     FileWatermarkStore, IndexingService, OpenAIConfig, OpenAIProvider, PostgrestChunkRepository,
//!     PostgrestConfig, TextChunker, ZendeskClient, ZendeskConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let retry = RetryConfig::default();
//! let source = ZendeskClient::new(ZendeskConfig::from_env()?, retry.clone())?;
//! let embedder = OpenAIProvider::new(OpenAIConfig::from_env()?)?;
//! let repository = PostgrestChunkRepository::new(PostgrestConfig::new(
//!     "https://xyz.supabase.co",
//!     "service-key",
//! ))?;
//!
//! let service = IndexingService::new(
//!     Arc::new(source),
//!     Arc::new(embedder),
//!     Arc::new(repository),
//!     Arc::new(FileWatermarkStore::new(".ticket-indexer/watermark.json")),
//! )
//! .with_chunker(TextChunker::new(5000, 0)?)
//! .with_retry(retry);
//!
//! let report = service.run_once().await;
//! println!("indexed {} tickets", report.tickets_indexed);
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod embedding;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod postgres;
pub mod postgrest;
pub mod repository;
pub mod service;
pub mod watermark;
pub mod zendesk;

// Re-export commonly used types
pub use chunker::{DEFAULT_CHUNK_SIZE, TextChunk, TextChunker};
pub use embedding::{EmbeddingProvider, OpenAIConfig, OpenAIProvider};
pub use error::{IndexerError, IndexerResult};
pub use models::{IndexRunReport, NormalizedTicket, RawTicket, RunOutcome, TicketChunk, TicketMetadata};
pub use normalizer::normalize_ticket;
pub use postgres::PgChunkRepository;
pub use postgrest::{PostgrestChunkRepository, PostgrestConfig};
pub use repository::ChunkRepository;
pub use service::{IndexStatus, IndexingService, advance_watermark};
pub use watermark::{FileWatermarkStore, InMemoryWatermarkStore, StoreWatermark, WatermarkStore};
pub use zendesk::{TicketSource, ZendeskClient, ZendeskConfig};
