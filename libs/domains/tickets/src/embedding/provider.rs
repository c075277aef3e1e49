use async_trait::async_trait;

use crate::error::IndexerResult;

/// Trait for embedding generation providers
///
/// Calls are single attempts; retry and fallback policy belongs to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> IndexerResult<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> IndexerResult<Vec<Vec<f32>>>;
}
