use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_parse_or_default, env_required};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::EmbeddingProvider;
use crate::error::{IndexerError, IndexerResult, parse_retry_after};
use crate::zendesk::DEFAULT_HTTP_TIMEOUT_SECS;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// OpenAI embedding provider configuration
#[derive(Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Expected vector length; must match the `embedding` column
    pub dimension: usize,
    /// Send `dimensions` in requests; only for models that accept it
    pub request_dimensions: bool,
    pub timeout: Duration,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: model.into(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            request_dimensions: false,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Request vectors of `dimension` explicitly
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self.request_dimensions = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("request_dimensions", &self.request_dimensions)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FromEnv for OpenAIConfig {
    /// Load from `OPENAI_API_KEY`, `EMBEDDING_MODEL`, `OPENAI_BASE_URL`,
    /// `EMBEDDING_DIMENSION` and `HTTP_TIMEOUT_SECS`
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(env_required("OPENAI_API_KEY")?, env_required("EMBEDDING_MODEL")?)
            .with_base_url(env_or_default("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL))
            .with_timeout(Duration::from_secs(env_parse_or_default(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?));

        if env_optional("EMBEDDING_DIMENSION").is_some() {
            let dimension: usize = env_parse_or_default("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?;
            if dimension == 0 {
                return Err(ConfigError::parse("EMBEDDING_DIMENSION", "must be greater than zero"));
            }
            config = config.with_dimension(dimension);
        }

        Ok(config)
    }
}

/// OpenAI-compatible embeddings provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> IndexerResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IndexerError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn build_request(&self, texts: &[String]) -> EmbeddingRequest {
        EmbeddingRequest {
            model: self.config.model.clone(),
            input: texts.to_vec(),
            dimensions: self
                .config
                .request_dimensions
                .then_some(self.config.dimension as u32),
        }
    }

    /// Order vectors by input index and check their count and length
    fn collect_vectors(
        &self,
        response: EmbeddingResponse,
        expected: usize,
    ) -> IndexerResult<Vec<Vec<f32>>> {
        let mut data = response.data;
        if data.len() != expected {
            return Err(IndexerError::EmbeddingApi(format!(
                "Expected {} embeddings, got {}",
                expected,
                data.len()
            )));
        }

        // Sort by index to maintain order
        data.sort_by_key(|d| d.index);

        data.into_iter()
            .map(|d| {
                if d.embedding.len() == self.config.dimension {
                    Ok(d.embedding)
                } else {
                    Err(IndexerError::EmbeddingApi(format!(
                        "Embedding {} has dimension {}, expected {}",
                        d.index,
                        d.embedding.len(),
                        self.config.dimension
                    )))
                }
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> IndexerResult<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| IndexerError::EmbeddingApi("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> IndexerResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let response = self
            .client
            .post(self.config.embeddings_url())
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(texts))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let error_text = response.text().await.unwrap_or_default();
            return Err(IndexerError::from_status(
                status,
                retry_after,
                &error_text,
                IndexerError::EmbeddingApi,
            ));
        }

        let body = response.text().await?;
        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| IndexerError::EmbeddingApi(format!("Undecodable response: {}", e)))?;

        self.collect_vectors(parsed, texts.len())
    }
}
