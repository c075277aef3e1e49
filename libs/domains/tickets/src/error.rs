use std::time::Duration;

use core_config::ConfigError;
use database::{DatabaseError, common::Retryable};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use sea_orm::DbErr;
use thiserror::Error;

/// Result type for ticket indexing operations
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Errors that can occur while indexing helpdesk tickets
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Missing or invalid settings; fatal before any work starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Credentials rejected by a remote API
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Remote API throttled the request
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimit { retry_after: Option<Duration> },

    /// Connectivity problem, timeout or 5xx response
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Permanent helpdesk API error
    #[error("Helpdesk API error: {0}")]
    Api(String),

    /// Permanent embedding provider error
    #[error("Embedding API error: {0}")]
    EmbeddingApi(String),

    /// Destination store rejected a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexerError {
    /// Classify a non-success HTTP response
    ///
    /// 401/403 are authentication failures, 429 is a rate limit, 408 and 5xx are
    /// transient. Anything else is handed to `permanent`, which picks the error kind
    /// of the calling API.
    pub fn from_status(
        status: StatusCode,
        retry_after: Option<Duration>,
        body: &str,
        permanent: impl FnOnce(String) -> IndexerError,
    ) -> Self {
        let message = if body.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status, truncate(body, 512))
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                IndexerError::Authentication(message)
            }
            StatusCode::TOO_MANY_REQUESTS => IndexerError::RateLimit { retry_after },
            StatusCode::REQUEST_TIMEOUT => IndexerError::TransientNetwork(message),
            s if s.is_server_error() => IndexerError::TransientNetwork(message),
            _ => permanent(message),
        }
    }
}

impl Retryable for IndexerError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexerError::RateLimit { .. } | IndexerError::TransientNetwork(_)
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            IndexerError::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Read a `Retry-After` header given in seconds
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

impl From<reqwest::Error> for IndexerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            IndexerError::TransientNetwork(err.to_string())
        } else if err.is_decode() {
            IndexerError::Api(format!("Undecodable response: {}", err))
        } else {
            IndexerError::Internal(err.to_string())
        }
    }
}

impl From<DbErr> for IndexerError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => {
                IndexerError::TransientNetwork(err.to_string())
            }
            _ => IndexerError::Storage(err.to_string()),
        }
    }
}

impl From<DatabaseError> for IndexerError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Postgres(db_err) => db_err.into(),
            other => IndexerError::Storage(other.to_string()),
        }
    }
}

impl From<ConfigError> for IndexerError {
    fn from(err: ConfigError) -> Self {
        IndexerError::Configuration(err.to_string())
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(err: serde_json::Error) -> Self {
        IndexerError::Internal(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for IndexerError {
    fn from(err: std::io::Error) -> Self {
        IndexerError::Internal(format!("I/O error: {}", err))
    }
}
