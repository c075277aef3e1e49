use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ZendeskSyncState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ZendeskSyncState::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ZendeskSyncState::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ZendeskSyncState::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(ZendeskSyncState::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}

/// One row per synced table, keyed by table name
#[derive(DeriveIden)]
enum ZendeskSyncState {
    Table,
    Name,
    LastSyncedAt,
    UpdatedAt,
}
