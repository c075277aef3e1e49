//! Common utilities shared by the database layer and the HTTP clients built on it

pub mod error;
pub mod retry;

pub use error::{DatabaseError, DatabaseResult};
pub use retry::{RetryConfig, Retryable, retry, retry_retryable, retry_with_backoff};
