//! Raw helpdesk tickets to [`NormalizedTicket`]s.

use crate::models::{NormalizedTicket, RawTicket, TicketMetadata};

/// Title used when a ticket has no subject
pub const DEFAULT_TITLE: &str = "No subject";

/// Normalize one raw ticket
///
/// The body is the comment bodies joined by a blank line, or the description when the
/// ticket has no comments. Returns `None` when there is no text to index.
pub fn normalize_ticket(raw: &RawTicket, ticket_base_url: &str) -> Option<NormalizedTicket> {
    let comments: Vec<String> = raw
        .comments
        .iter()
        .map(|c| normalize_newlines(c))
        .filter(|c| !c.trim().is_empty())
        .collect();

    let body = if comments.is_empty() {
        normalize_newlines(raw.description.as_deref().unwrap_or_default())
    } else {
        comments.join("\n\n")
    };

    if body.trim().is_empty() {
        return None;
    }

    let title = raw
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();

    Some(NormalizedTicket {
        id: raw.id,
        url: ticket_url(ticket_base_url, raw.id),
        title,
        body,
        metadata: TicketMetadata {
            ticket_id: raw.id,
            status: raw.status.clone(),
            priority: raw.priority.clone(),
            tags: raw.tags.clone(),
            requester: raw.requester_id,
            assignee: raw.assignee_id,
            organization_id: raw.organization_id,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        },
        updated_at: raw.updated_at,
    })
}

/// `{base}/{id}` with exactly one slash in between
pub fn ticket_url(ticket_base_url: &str, id: u64) -> String {
    format!("{}/{}", ticket_base_url.trim_end_matches('/'), id)
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const BASE: &str = "https://acme.zendesk.com/agent/tickets";

    fn raw(subject: Option<&str>, description: Option<&str>, comments: &[&str]) -> RawTicket {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        RawTicket {
            id: 1001,
            subject: subject.map(String::from),
            description: description.map(String::from),
            status: Some("solved".into()),
            priority: Some("high".into()),
            tags: vec!["billing".into()],
            requester_id: Some(11),
            assignee_id: Some(12),
            organization_id: None,
            created_at: ts,
            updated_at: ts,
            comments: comments.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_comments_form_the_body() {
        let ticket = normalize_ticket(
            &raw(Some("Refund"), Some("desc"), &["first", "second"]),
            BASE,
        )
        .unwrap();

        assert_eq!(ticket.body, "first\n\nsecond");
        assert_eq!(ticket.title, "Refund");
        assert_eq!(ticket.url, "https://acme.zendesk.com/agent/tickets/1001");
        assert_eq!(ticket.metadata.priority.as_deref(), Some("high"));
        assert_eq!(ticket.metadata.requester, Some(11));
    }

    #[test]
    fn test_description_is_used_without_comments() {
        let ticket = normalize_ticket(&raw(Some("Refund"), Some("only desc"), &[]), BASE).unwrap();
        assert_eq!(ticket.body, "only desc");
    }

    #[test]
    fn test_blank_comments_are_ignored() {
        let ticket =
            normalize_ticket(&raw(Some("Refund"), Some("desc"), &["  ", "real"]), BASE).unwrap();
        assert_eq!(ticket.body, "real");
    }

    #[test]
    fn test_empty_body_is_skipped() {
        assert!(normalize_ticket(&raw(Some("Empty"), None, &[]), BASE).is_none());
        assert!(normalize_ticket(&raw(Some("Empty"), Some(" \n\t "), &["\r\n"]), BASE).is_none());
    }

    #[test]
    fn test_missing_subject_falls_back() {
        let ticket = normalize_ticket(&raw(None, Some("body"), &[]), BASE).unwrap();
        assert_eq!(ticket.title, DEFAULT_TITLE);

        let ticket = normalize_ticket(&raw(Some("   "), Some("body"), &[]), BASE).unwrap();
        assert_eq!(ticket.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_carriage_returns_are_normalized() {
        let ticket = normalize_ticket(&raw(Some("x"), None, &["a\r\nb\rc"]), BASE).unwrap();
        assert_eq!(ticket.body, "a\nb\nc");
    }

    #[test]
    fn test_ticket_url_trims_trailing_slash() {
        assert_eq!(
            ticket_url("https://example.zendesk.com/tickets/", 1),
            "https://example.zendesk.com/tickets/1"
        );
    }
}
