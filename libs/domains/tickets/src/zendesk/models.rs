//! Zendesk API response shapes.

use serde::Deserialize;

use crate::models::RawTicket;

/// Page of `GET /api/v2/search.json`
#[derive(Debug, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub results: Vec<RawTicket>,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

/// Page of `GET /api/v2/tickets/{id}/comments.json`
#[derive(Debug, Deserialize)]
pub struct CommentsPage {
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub public: Option<bool>,
}
