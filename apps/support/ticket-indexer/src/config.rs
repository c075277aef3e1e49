//! Configuration for the ticket indexer

use core_config::{
    ConfigError, FromEnv, env_optional, env_or_default, env_parse_or_default, env_required,
};
use database::common::RetryConfig;
use database::postgres::PostgresConfig;
use domain_tickets::zendesk::DEFAULT_HTTP_TIMEOUT_SECS;
use domain_tickets::{DEFAULT_CHUNK_SIZE, OpenAIConfig, PostgrestConfig, ZendeskConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CRON: &str = "0 0 * * * *";
pub const DEFAULT_WATERMARK_PATH: &str = ".ticket-indexer/watermark.json";

/// Where chunk rows are written
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// Supabase REST API (`https://...`)
    Rest(PostgrestConfig),
    /// Direct Postgres connection (`postgres://...`)
    Postgres(PostgresConfig),
}

impl StoreBackend {
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_required("SUPABASE_URL")?;
        let url = url.trim();

        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(StoreBackend::Postgres(
                PostgresConfig::new(url).with_env_overrides()?,
            ));
        }

        if url.starts_with("https://") || url.starts_with("http://") {
            let key = env_required("SUPABASE_SERVICE_KEY")?;
            let timeout = env_parse_or_default("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
            return Ok(StoreBackend::Rest(
                PostgrestConfig::new(url, key).with_timeout(Duration::from_secs(timeout)),
            ));
        }

        Err(ConfigError::parse(
            "SUPABASE_URL",
            "expected an http(s):// or postgres:// URL",
        ))
    }
}

/// Where the sync watermark lives between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkSource {
    File,
    Store,
}

impl FromStr for WatermarkSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(WatermarkSource::File),
            "store" => Ok(WatermarkSource::Store),
            other => Err(format!("unknown watermark source '{}' (file|store)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub zendesk: ZendeskConfig,
    pub openai: OpenAIConfig,
    pub store: StoreBackend,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retry: RetryConfig,
    pub watermark_source: WatermarkSource,
    pub watermark_path: PathBuf,
    /// Default schedule for the `schedule` command
    pub cron: String,
    /// Prometheus listener, disabled when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl FromEnv for IndexerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let chunk_size = env_parse_or_default("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let chunk_overlap = env_parse_or_default("CHUNK_OVERLAP", 0usize)?;
        if chunk_size == 0 {
            return Err(ConfigError::parse("CHUNK_SIZE", "must be greater than zero"));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::parse(
                "CHUNK_OVERLAP",
                format!("must be smaller than CHUNK_SIZE ({})", chunk_size),
            ));
        }

        let defaults = RetryConfig::default();
        let retry = RetryConfig::new()
            .with_max_retries(env_parse_or_default("RETRY_MAX_RETRIES", defaults.max_retries)?)
            .with_initial_delay(env_parse_or_default(
                "RETRY_INITIAL_DELAY_MS",
                defaults.initial_delay_ms,
            )?)
            .with_max_delay(env_parse_or_default("RETRY_MAX_DELAY_MS", defaults.max_delay_ms)?);

        let metrics_addr = env_optional("METRICS_ADDR")
            .map(|raw| {
                raw.trim()
                    .parse::<SocketAddr>()
                    .map_err(|e| ConfigError::parse("METRICS_ADDR", format!("'{}': {}", raw, e)))
            })
            .transpose()?;

        Ok(Self {
            zendesk: ZendeskConfig::from_env()?,
            openai: OpenAIConfig::from_env()?,
            store: StoreBackend::from_env()?,
            chunk_size,
            chunk_overlap,
            retry,
            watermark_source: env_parse_or_default("WATERMARK_SOURCE", WatermarkSource::File)?,
            watermark_path: PathBuf::from(env_or_default("WATERMARK_PATH", DEFAULT_WATERMARK_PATH)),
            cron: env_or_default("INDEXER_CRON", DEFAULT_CRON),
            metrics_addr,
        })
    }
}
