mod openai;
mod provider;

pub use openai::{DEFAULT_EMBEDDING_DIMENSION, DEFAULT_OPENAI_BASE_URL, OpenAIConfig, OpenAIProvider};
pub use provider::EmbeddingProvider;

#[cfg(test)]
pub use provider::MockEmbeddingProvider;
