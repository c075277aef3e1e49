pub use sea_orm_migration::prelude::*;

mod m20251018_000000_create_zendesk_tickets;
mod m20251018_000001_create_zendesk_sync_state;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251018_000000_create_zendesk_tickets::Migration),
            Box::new(m20251018_000001_create_zendesk_sync_state::Migration),
        ]
    }
}
