use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use database::common::{RetryConfig, retry_retryable};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

use super::TicketSource;
use super::config::ZendeskConfig;
use super::models::{CommentsPage, SearchPage};
use crate::error::{IndexerError, IndexerResult, parse_retry_after};
use crate::models::RawTicket;

const PAGE_SIZE: u32 = 100;

/// Zendesk search never returns more results than this for one query
pub const SEARCH_RESULT_LIMIT: usize = 1000;

/// Zendesk REST API client
pub struct ZendeskClient {
    client: Client,
    config: ZendeskConfig,
    retry: RetryConfig,
}

impl ZendeskClient {
    pub fn new(config: ZendeskConfig, retry: RetryConfig) -> IndexerResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("ticket-indexer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IndexerError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// Search query selecting tickets of the configured status updated after `since`
    pub fn search_query(status: &str, since: Option<DateTime<Utc>>) -> String {
        let mut query = format!("type:ticket status:{}", status);
        if let Some(since) = since {
            query.push_str(&format!(
                " updated>{}",
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        query
    }

    /// First search page request parameters
    fn search_params(&self, since: Option<DateTime<Utc>>) -> Vec<(&'static str, String)> {
        vec![
            ("query", Self::search_query(&self.config.ticket_status, since)),
            ("sort_by", "updated_at".to_string()),
            ("sort_order", "asc".to_string()),
            ("per_page", PAGE_SIZE.to_string()),
        ]
    }

    /// Only follow pagination links pointing back at the configured API
    fn check_next_page(&self, next_page: Option<String>) -> IndexerResult<Option<String>> {
        match next_page {
            Some(url) if url.starts_with(&self.config.api_base_url()) => Ok(Some(url)),
            Some(url) => Err(IndexerError::Api(format!(
                "Refusing to follow pagination link outside the API: {}",
                url
            ))),
            None => Ok(None),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> IndexerResult<T> {
        let response = self
            .client
            .get(url)
            .basic_auth(self.config.auth_user(), Some(&self.config.api_token))
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(IndexerError::from_status(
                status,
                retry_after,
                &body,
                IndexerError::Api,
            ));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| IndexerError::Api(format!("Unexpected response from {}: {}", url, e)))
    }

    async fn get_json_with_retry<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        params: &[(&'static str, String)],
    ) -> IndexerResult<T> {
        retry_retryable(&self.retry, operation, move || self.get_json(url, params)).await
    }

    #[instrument(skip(self))]
    async fn search_tickets(&self, since: Option<DateTime<Utc>>) -> IndexerResult<Vec<RawTicket>> {
        let mut tickets = Vec::new();
        let mut url = format!("{}/search.json", self.config.api_base_url());
        let mut params = self.search_params(since);
        let mut pages = 0;
        let mut truncated = false;

        loop {
            let page: SearchPage = self
                .get_json_with_retry("zendesk.search", &url, &params)
                .await?;
            pages += 1;
            debug!(page = pages, results = page.results.len(), total = ?page.count, "Fetched search page");

            tickets.extend(page.results);

            match self.check_next_page(page.next_page)? {
                // Pages past the limit are rejected with 422
                Some(_) if tickets.len() >= SEARCH_RESULT_LIMIT => {
                    truncated = true;
                    break;
                }
                Some(next) => {
                    url = next;
                    // next_page already carries the query string
                    params = Vec::new();
                }
                None => break,
            }
        }

        let tickets = dedupe_by_id(tickets);
        if !truncated {
            return Ok(tickets);
        }

        let fetched = tickets.len();
        let tickets = trim_truncated_batch(tickets);
        warn!(
            fetched,
            kept = tickets.len(),
            limit = SEARCH_RESULT_LIMIT,
            "Search result limit reached, remaining tickets are picked up next run"
        );
        Ok(tickets)
    }
}

/// Drop the tickets sharing the newest `updated_at` of a truncated batch
///
/// The next query asks for `updated>` the watermark, so unfetched tickets with that same
/// timestamp would be skipped for good. A batch where every ticket shares one timestamp
/// is returned whole.
fn trim_truncated_batch(tickets: Vec<RawTicket>) -> Vec<RawTicket> {
    let Some(newest) = tickets.iter().map(|t| t.updated_at).max() else {
        return tickets;
    };
    if tickets.iter().all(|t| t.updated_at == newest) {
        warn!(updated_at = %newest, "Whole truncated batch shares one timestamp");
        return tickets;
    }
    tickets
        .into_iter()
        .filter(|t| t.updated_at < newest)
        .collect()
}

/// Keep the last copy of each ticket, preserving first-seen order
///
/// Sorting by `updated_at` lets a ticket that changes mid-pagination show up twice.
fn dedupe_by_id(tickets: Vec<RawTicket>) -> Vec<RawTicket> {
    let mut positions: HashMap<u64, usize> = HashMap::new();
    let mut unique: Vec<RawTicket> = Vec::with_capacity(tickets.len());

    for ticket in tickets {
        match positions.get(&ticket.id) {
            Some(&idx) => unique[idx] = ticket,
            None => {
                positions.insert(ticket.id, unique.len());
                unique.push(ticket);
            }
        }
    }

    unique
}

#[async_trait]
impl TicketSource for ZendeskClient {
    async fn fetch_updated_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> IndexerResult<Vec<RawTicket>> {
        let tickets = self.search_tickets(since).await?;

        info!(
            count = tickets.len(),
            status = %self.config.ticket_status,
            since = ?since,
            "Fetched tickets from Zendesk"
        );
        Ok(tickets)
    }

    #[instrument(skip(self))]
    async fn fetch_comments(&self, ticket_id: u64) -> IndexerResult<Vec<String>> {
        let mut bodies = Vec::new();
        let mut url = format!(
            "{}/tickets/{}/comments.json",
            self.config.api_base_url(),
            ticket_id
        );

        loop {
            let page: CommentsPage = self
                .get_json_with_retry("zendesk.comments", &url, &[])
                .await?;
            bodies.extend(page.comments.into_iter().map(|c| c.body));

            match self.check_next_page(page.next_page)? {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(bodies)
    }

    fn ticket_base_url(&self) -> String {
        self.config.ticket_base_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn client() -> ZendeskClient {
        ZendeskClient::new(
            ZendeskConfig::new("acme", "agent@acme.test", "token"),
            RetryConfig::disabled(),
        )
        .unwrap()
    }

    fn raw(id: u64, subject: &str) -> RawTicket {
        raw_at(id, subject, 0)
    }

    fn raw_at(id: u64, subject: &str, minute: u32) -> RawTicket {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap();
        RawTicket {
            id,
            subject: Some(subject.to_string()),
            description: None,
            status: None,
            priority: None,
            tags: vec![],
            requester_id: None,
            assignee_id: None,
            organization_id: None,
            created_at: ts,
            updated_at: ts,
            comments: vec![],
        }
    }

    #[test]
    fn test_search_query_without_watermark() {
        assert_eq!(
            ZendeskClient::search_query("solved", None),
            "type:ticket status:solved"
        );
    }

    #[test]
    fn test_search_query_with_watermark() {
        let since = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        assert_eq!(
            ZendeskClient::search_query("closed", Some(since)),
            "type:ticket status:closed updated>2024-02-03T04:05:06Z"
        );
    }

    #[test]
    fn test_search_params_sort_oldest_first() {
        let params = client().search_params(None);
        assert!(params.contains(&("sort_by", "updated_at".to_string())));
        assert!(params.contains(&("sort_order", "asc".to_string())));
        assert!(params.contains(&("per_page", "100".to_string())));
    }

    #[test]
    fn test_next_page_must_stay_on_api_host() {
        let client = client();
        assert_eq!(client.check_next_page(None).unwrap(), None);
        assert!(
            client
                .check_next_page(Some(
                    "https://acme.zendesk.com/api/v2/search.json?page=2".to_string()
                ))
                .unwrap()
                .is_some()
        );
        assert!(
            client
                .check_next_page(Some("https://evil.example/api/v2/search.json".to_string()))
                .is_err()
        );
    }

    #[test]
    fn test_dedupe_keeps_latest_copy() {
        let tickets = vec![raw(1, "old"), raw(2, "two"), raw(1, "new")];
        let unique = dedupe_by_id(tickets);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].subject.as_deref(), Some("new"));
        assert_eq!(unique[1].id, 2);
    }

    #[test]
    fn test_truncated_batch_drops_newest_timestamp() {
        let tickets = vec![
            raw_at(1, "a", 1),
            raw_at(2, "b", 2),
            raw_at(3, "c", 3),
            raw_at(4, "d", 3),
        ];
        let kept = trim_truncated_batch(tickets);
        let ids: Vec<u64> = kept.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_truncated_batch_with_one_timestamp_is_kept() {
        let tickets = vec![raw_at(1, "a", 5), raw_at(2, "b", 5)];
        assert_eq!(trim_truncated_batch(tickets).len(), 2);
        assert!(trim_truncated_batch(Vec::new()).is_empty());
    }

    #[test]
    fn test_ticket_base_url() {
        assert_eq!(
            client().ticket_base_url(),
            "https://acme.zendesk.com/agent/tickets"
        );
    }
}
