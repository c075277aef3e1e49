mod client;
mod config;
pub mod models;

pub use client::{SEARCH_RESULT_LIMIT, ZendeskClient};
pub use config::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_TICKET_STATUS, ZendeskConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::IndexerResult;
use crate::models::RawTicket;

/// Source of helpdesk tickets
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Tickets updated after `since` (all tickets when `None`), oldest first
    ///
    /// Comments are left empty; a batch cut short by the search limit ends before
    /// its newest timestamp so the next run resumes there.
    async fn fetch_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> IndexerResult<Vec<RawTicket>>;

    /// Comment bodies of one ticket, oldest first
    async fn fetch_comments(&self, ticket_id: u64) -> IndexerResult<Vec<String>>;

    /// Prefix for the human-facing ticket links stored as chunk URLs
    fn ticket_base_url(&self) -> String;
}
