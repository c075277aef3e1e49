//! Shared test utilities for domain testing
//!
//! This crate provides reusable test infrastructure for the domain crates:
//! - `TestDatabase`: pgvector PostgreSQL container with automatic cleanup (feature: "postgres")
//! - `TestDataBuilder`: Deterministic ticket data generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Features
//!
//! - `postgres` (default): Enables PostgreSQL test infrastructure
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let ticket_id = builder.ticket_id();
//!     let body = builder.body(3);
//! }
//! ```

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_index_ticket");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Ticket id derived from the seed, offset so callers can add small numbers
    pub fn ticket_id(&self) -> u64 {
        (self.seed % 1_000_000) + 1_000
    }

    /// Agent URL for a ticket under the given base
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(0);
    /// assert_eq!(
    ///     builder.ticket_url("https://acme.zendesk.com/agent/tickets", 7),
    ///     "https://acme.zendesk.com/agent/tickets/7"
    /// );
    /// ```
    pub fn ticket_url(&self, base: &str, id: u64) -> String {
        format!("{}/{}", base.trim_end_matches('/'), id)
    }

    /// Generate a unique ticket subject
    pub fn subject(&self, suffix: &str) -> String {
        format!("Test ticket {} {}", self.seed, suffix)
    }

    /// Multi-paragraph ticket body, each paragraph a few sentences long
    pub fn body(&self, paragraphs: usize) -> String {
        (0..paragraphs)
            .map(|p| {
                format!(
                    "Paragraph {p} of ticket {seed}. The customer reports an issue. \
                     Support asked for logs and a screenshot. The reply arrived the next day.",
                    seed = self.seed
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that chunk numbers form the contiguous sequence `0..n`
    pub fn assert_contiguous(chunk_numbers: &[i32], context: &str) {
        let expected: Vec<i32> = (0..chunk_numbers.len() as i32).collect();
        assert_eq!(
            chunk_numbers, expected,
            "{}: chunk numbers are not contiguous from 0",
            context
        );
    }

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
