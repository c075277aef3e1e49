//! Wires configuration into an [`IndexingService`]

use database::postgres::{check_health, connect_from_config_with_retry, run_migrations};
use domain_tickets::{
    ChunkRepository, FileWatermarkStore, IndexingService, OpenAIProvider, PgChunkRepository,
    PostgrestChunkRepository, StoreWatermark, TextChunker, WatermarkStore, ZendeskClient,
};
use eyre::{Result, WrapErr};
use migration::Migrator;
use std::sync::Arc;
use tracing::info;

use crate::config::{IndexerConfig, StoreBackend, WatermarkSource};

pub async fn build_service(config: &IndexerConfig) -> Result<IndexingService> {
    let source = ZendeskClient::new(config.zendesk.clone(), config.retry.clone())?;
    let embedder = OpenAIProvider::new(config.openai.clone())?;
    let repository = build_repository(config).await?;

    let watermark: Arc<dyn WatermarkStore> = match config.watermark_source {
        WatermarkSource::File => {
            info!(path = %config.watermark_path.display(), "Using file watermark");
            Arc::new(FileWatermarkStore::new(&config.watermark_path))
        }
        WatermarkSource::Store => {
            info!("Using watermark stored in zendesk_sync_state");
            Arc::new(StoreWatermark::new(repository.clone()))
        }
    };

    let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;

    Ok(IndexingService::new(
        Arc::new(source),
        Arc::new(embedder),
        repository,
        watermark,
    )
    .with_chunker(chunker)
    .with_retry(config.retry.clone()))
}

async fn build_repository(config: &IndexerConfig) -> Result<Arc<dyn ChunkRepository>> {
    match &config.store {
        StoreBackend::Rest(rest) => {
            info!(url = %rest.url, "Writing chunks through the REST API");
            Ok(Arc::new(PostgrestChunkRepository::new(rest.clone())?))
        }
        StoreBackend::Postgres(pg) => {
            info!("Connecting to database...");
            let db = connect_from_config_with_retry(pg.clone(), Some(config.retry.clone()))
                .await
                .wrap_err("Database connection failed")?;
            check_health(&db).await?;

            run_migrations::<Migrator>(&db, "ticket-indexer").await?;
            Ok(Arc::new(PgChunkRepository::new(db)))
        }
    }
}
