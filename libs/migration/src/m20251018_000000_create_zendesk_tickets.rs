use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // pgvector provides the vector type and distance operators
        manager
            .get_connection()
            .execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
            .await?;

        // Raw DDL: the vector column has no schema builder helper
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE IF NOT EXISTS zendesk_tickets (
                    id BIGSERIAL PRIMARY KEY,
                    url VARCHAR NOT NULL,
                    chunk_number INTEGER NOT NULL,
                    title VARCHAR NOT NULL,
                    summary VARCHAR,
                    content TEXT NOT NULL,
                    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                    embedding VECTOR(1536),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT timezone('utc', now())
                )
                "#,
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_zendesk_tickets_url_chunk")
                    .table(ZendeskTickets::Table)
                    .col(ZendeskTickets::Url)
                    .col(ZendeskTickets::ChunkNumber)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_zendesk_tickets_metadata ON zendesk_tickets USING gin (metadata)",
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_zendesk_tickets_embedding ON zendesk_tickets USING hnsw (embedding vector_cosine_ops)",
            )
            .await?;

        // Similarity search used by the consuming application
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE OR REPLACE FUNCTION match_zendesk_tickets (
                    query_embedding VECTOR(1536),
                    match_count INT DEFAULT 10,
                    filter JSONB DEFAULT '{}'::jsonb
                ) RETURNS TABLE (
                    id BIGINT,
                    url VARCHAR,
                    chunk_number INTEGER,
                    title VARCHAR,
                    summary VARCHAR,
                    content TEXT,
                    metadata JSONB,
                    similarity FLOAT
                )
                LANGUAGE plpgsql
                AS $$
                #variable_conflict use_column
                BEGIN
                    RETURN QUERY
                    SELECT
                        id,
                        url,
                        chunk_number,
                        title,
                        summary,
                        content,
                        metadata,
                        1 - (zendesk_tickets.embedding <=> query_embedding) AS similarity
                    FROM zendesk_tickets
                    WHERE metadata @> filter
                    ORDER BY zendesk_tickets.embedding <=> query_embedding
                    LIMIT match_count;
                END;
                $$
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "DROP FUNCTION IF EXISTS match_zendesk_tickets(VECTOR, INT, JSONB)",
            )
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .table(ZendeskTickets::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum ZendeskTickets {
    Table,
    Url,
    ChunkNumber,
}
