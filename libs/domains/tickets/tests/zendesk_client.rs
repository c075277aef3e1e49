//! ZendeskClient against a local fake of the Zendesk API
//!
//! The fake serves `search.json` pages of 100 tickets and, like Zendesk, rejects
//! any page past the 1000th result with 422.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, TimeZone, Utc};
use database::common::RetryConfig;
use domain_tickets::zendesk::SEARCH_RESULT_LIMIT;
use domain_tickets::{IndexerError, TicketSource, ZendeskClient, ZendeskConfig};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const PER_PAGE: u64 = 100;

struct FakeZendesk {
    base_url: String,
    /// Matching tickets the search would find without the result limit
    total: u64,
    search_requests: AtomicUsize,
    first_query: std::sync::Mutex<Option<HashMap<String, String>>>,
    /// Page answered once with 503 before succeeding
    flaky_page: Option<u64>,
    flaked: AtomicBool,
    missing_comments: HashSet<u64>,
}

/// Tickets 999 and 1000 share a timestamp, straddling the result limit
fn updated_at(id: u64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::seconds(id.min(999) as i64)
}

fn ticket_json(id: u64) -> serde_json::Value {
    let ts = updated_at(id).to_rfc3339();
    json!({
        "id": id,
        "subject": format!("Ticket {}", id),
        "description": "Printer on fire",
        "status": "solved",
        "tags": [],
        "created_at": ts,
        "updated_at": ts,
    })
}

async fn search(
    State(state): State<Arc<FakeZendesk>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.search_requests.fetch_add(1, Ordering::SeqCst);
    let page: u64 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    if page == 1 {
        *state.first_query.lock().unwrap() = Some(params.clone());
    }

    if (page - 1) * PER_PAGE >= SEARCH_RESULT_LIMIT as u64 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "invalid", "description": "Requested response size was greater than Search Response Limits"})),
        )
            .into_response();
    }
    if state.flaky_page == Some(page) && !state.flaked.swap(true, Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let first = (page - 1) * PER_PAGE + 1;
    let last = (page * PER_PAGE).min(state.total);
    let results: Vec<_> = (first..=last).map(ticket_json).collect();
    let next_page = (last < state.total)
        .then(|| format!("{}/api/v2/search.json?page={}", state.base_url, page + 1));

    Json(json!({"results": results, "next_page": next_page, "count": state.total})).into_response()
}

async fn comments(State(state): State<Arc<FakeZendesk>>, Path(id): Path<u64>) -> Response {
    if state.missing_comments.contains(&id) {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "RecordNotFound"}))).into_response();
    }
    Json(json!({
        "comments": [
            {"id": 1, "body": format!("question on {}", id), "public": true},
            {"id": 2, "body": format!("answer on {}", id), "public": true},
        ],
        "next_page": null,
    }))
    .into_response()
}

struct FakeBuilder {
    total: u64,
    flaky_page: Option<u64>,
    missing_comments: HashSet<u64>,
}

impl FakeBuilder {
    fn new(total: u64) -> Self {
        Self {
            total,
            flaky_page: None,
            missing_comments: HashSet::new(),
        }
    }

    fn flaky_page(mut self, page: u64) -> Self {
        self.flaky_page = Some(page);
        self
    }

    fn missing_comments(mut self, id: u64) -> Self {
        self.missing_comments.insert(id);
        self
    }

    async fn serve(self) -> Arc<FakeZendesk> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(FakeZendesk {
            base_url: format!("http://{}", addr),
            total: self.total,
            search_requests: AtomicUsize::new(0),
            first_query: std::sync::Mutex::new(None),
            flaky_page: self.flaky_page,
            flaked: AtomicBool::new(false),
            missing_comments: self.missing_comments,
        });

        let router = Router::new()
            .route("/api/v2/search.json", get(search))
            .route("/api/v2/tickets/{id}/comments.json", get(comments))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        state
    }
}

fn client(fake: &FakeZendesk, retry: RetryConfig) -> ZendeskClient {
    let mut config = ZendeskConfig::new("acme", "agent@acme.test", "token");
    config.base_url = Some(fake.base_url.clone());
    ZendeskClient::new(config, retry).unwrap()
}

fn ids(tickets: &[domain_tickets::RawTicket]) -> Vec<u64> {
    tickets.iter().map(|t| t.id).collect()
}

#[tokio::test]
async fn test_fetches_every_page_of_a_small_result() {
    let fake = FakeBuilder::new(150).serve().await;

    let tickets = client(&fake, RetryConfig::disabled())
        .fetch_updated_since(None)
        .await
        .unwrap();

    assert_eq!(ids(&tickets), (1..=150).collect::<Vec<_>>());
    assert!(tickets.iter().all(|t| t.comments.is_empty()));
    assert_eq!(fake.search_requests.load(Ordering::SeqCst), 2);

    let query = fake.first_query.lock().unwrap().clone().unwrap();
    assert_eq!(query["query"], "type:ticket status:solved");
    assert_eq!(query["sort_by"], "updated_at");
    assert_eq!(query["sort_order"], "asc");
}

#[tokio::test]
async fn test_stops_at_result_limit_and_trims_shared_timestamp() {
    let fake = FakeBuilder::new(2500).serve().await;

    let tickets = client(&fake, RetryConfig::disabled())
        .fetch_updated_since(None)
        .await
        .unwrap();

    // The page that would answer 422 is never requested
    assert_eq!(fake.search_requests.load(Ordering::SeqCst), 10);
    // 999 and 1000 share the newest timestamp, so both wait for the next run
    assert_eq!(tickets.len(), 998);
    assert_eq!(tickets.last().map(|t| t.id), Some(998));
    assert!(tickets.windows(2).all(|w| w[0].updated_at <= w[1].updated_at));
}

#[tokio::test]
async fn test_search_page_is_retried_inside_the_client() {
    let fake = FakeBuilder::new(150).flaky_page(2).serve().await;
    let retry = RetryConfig::new()
        .with_max_retries(1)
        .with_initial_delay(1)
        .without_jitter();

    let tickets = client(&fake, retry).fetch_updated_since(None).await.unwrap();

    assert_eq!(tickets.len(), 150);
    assert_eq!(fake.search_requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_fetch_comments_per_ticket() {
    let fake = FakeBuilder::new(3).missing_comments(2).serve().await;
    let client = client(&fake, RetryConfig::disabled());

    assert_eq!(
        client.fetch_comments(1).await.unwrap(),
        vec!["question on 1", "answer on 1"]
    );

    let err = client.fetch_comments(2).await.unwrap_err();
    assert!(matches!(err, IndexerError::Api(ref msg) if msg.starts_with("404")));

    assert_eq!(client.fetch_comments(3).await.unwrap().len(), 2);
}
