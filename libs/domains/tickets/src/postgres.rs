use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, Statement};
use tracing::{debug, instrument};

use crate::error::IndexerResult;
use crate::models::TicketChunk;
use crate::repository::{CHUNKS_TABLE, ChunkRepository, vector_literal};

const UPSERT_SQL: &str = r#"
    INSERT INTO zendesk_tickets (url, chunk_number, title, summary, content, metadata, embedding)
    VALUES ($1, $2, $3, $4, $5, $6, CAST($7 AS vector))
    ON CONFLICT (url, chunk_number) DO UPDATE
    SET title = EXCLUDED.title,
        summary = EXCLUDED.summary,
        content = EXCLUDED.content,
        metadata = EXCLUDED.metadata,
        embedding = EXCLUDED.embedding
"#;

const SAVE_WATERMARK_SQL: &str = r#"
    INSERT INTO zendesk_sync_state (name, last_synced_at, updated_at)
    VALUES ($1, $2, now())
    ON CONFLICT (name) DO UPDATE
    SET last_synced_at = EXCLUDED.last_synced_at,
        updated_at = EXCLUDED.updated_at
"#;

/// PostgreSQL (pgvector) implementation of ChunkRepository using SeaORM
#[derive(Clone)]
pub struct PgChunkRepository {
    db: DatabaseConnection,
}

impl PgChunkRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct SyncStateRow {
    last_synced_at: DateTime<Utc>,
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

#[async_trait]
impl ChunkRepository for PgChunkRepository {
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn upsert_chunks(&self, chunks: &[TicketChunk]) -> IndexerResult<usize> {
        let mut written = 0;

        // One statement per row: rows commit independently
        for chunk in chunks {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                UPSERT_SQL,
                [
                    chunk.url.clone().into(),
                    chunk.chunk_number.into(),
                    chunk.title.clone().into(),
                    chunk.summary.clone().into(),
                    chunk.content.clone().into(),
                    chunk.metadata.clone().into(),
                    vector_literal(&chunk.embedding).into(),
                ],
            );

            self.db.execute_raw(stmt).await?;
            written += 1;
        }

        debug!(written, "Upserted chunks");
        Ok(written)
    }

    async fn delete_chunks_from(&self, url: &str, first_stale_chunk: i32) -> IndexerResult<usize> {
        let sql = "DELETE FROM zendesk_tickets WHERE url = $1 AND chunk_number >= $2";
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [url.into(), first_stale_chunk.into()],
        );

        let result = self.db.execute_raw(stmt).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn load_sync_watermark(&self) -> IndexerResult<Option<DateTime<Utc>>> {
        let sql = "SELECT last_synced_at FROM zendesk_sync_state WHERE name = $1";
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [CHUNKS_TABLE.into()]);

        let row = SyncStateRow::find_by_statement(stmt).one(&self.db).await?;
        Ok(row.map(|r| r.last_synced_at))
    }

    #[instrument(skip(self))]
    async fn save_sync_watermark(&self, watermark: DateTime<Utc>) -> IndexerResult<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            SAVE_WATERMARK_SQL,
            [CHUNKS_TABLE.into(), watermark.into()],
        );

        self.db.execute_raw(stmt).await?;
        debug!(watermark = %watermark, "Saved sync watermark");
        Ok(())
    }

    async fn count_chunks(&self) -> IndexerResult<usize> {
        let sql = "SELECT COUNT(*) AS count FROM zendesk_tickets";
        let stmt = Statement::from_string(DbBackend::Postgres, sql.to_owned());

        let row = CountRow::find_by_statement(stmt).one(&self.db).await?;
        Ok(row.map(|r| r.count as usize).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn chunk(n: i32) -> TicketChunk {
        TicketChunk {
            url: "https://acme.zendesk.com/agent/tickets/1".to_string(),
            chunk_number: n,
            title: "Cannot log in".to_string(),
            summary: Some("Cannot log in".to_string()),
            content: format!("part {}", n),
            metadata: json!({"ticket_id": 1, "source": "zendesk"}),
            embedding: vec![0.1, 0.2],
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_upsert_writes_each_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1), exec(1), exec(1)])
            .into_connection();
        let repo = PgChunkRepository::new(db);

        let written = repo
            .upsert_chunks(&[chunk(0), chunk(1), chunk(2)])
            .await
            .unwrap();
        assert_eq!(written, 3);
    }

    #[tokio::test]
    async fn test_delete_reports_rows_affected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(2)])
            .into_connection();
        let repo = PgChunkRepository::new(db);

        let deleted = repo
            .delete_chunks_from("https://acme.zendesk.com/agent/tickets/1", 3)
            .await
            .unwrap();
        assert_eq!(deleted, 2);
    }

    #[tokio::test]
    async fn test_save_sync_watermark() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1)])
            .into_connection();
        let repo = PgChunkRepository::new(db);

        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        repo.save_sync_watermark(ts).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_sync_watermark_surfaces_db_errors() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_errors([sea_orm::DbErr::Custom("relation does not exist".into())])
            .into_connection();
        let repo = PgChunkRepository::new(db);

        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        assert!(repo.save_sync_watermark(ts).await.is_err());
    }
}
