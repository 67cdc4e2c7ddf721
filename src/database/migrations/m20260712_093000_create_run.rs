use sea_orm_migration::{
    prelude::*,
    schema::{string, timestamp, timestamp_null, uuid},
};

#[derive(DeriveMigrationName)]
pub struct Migration;

// No database-side defaults or triggers here: ids and timestamps are set by
// the application so the schema works on both Postgres and SQLite. Statuses
// and triggers are stored as plain strings for the same reason.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Run::Table)
                    .if_not_exists()
                    .col(uuid(Run::Id).primary_key())
                    .col(timestamp(Run::CreatedAt))
                    .col(timestamp(Run::UpdatedAt))
                    .col(string(Run::Trigger))
                    .col(string(Run::Status))
                    .col(timestamp_null(Run::StartedAt))
                    .col(timestamp_null(Run::FinishedAt))
                    .to_owned(),
            )
            .await?;

        // Workers scan for the oldest pending run; cleanup scans by age.
        manager
            .create_index(
                Index::create()
                    .name("idx-run-status")
                    .table(Run::Table)
                    .col(Run::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-run-created_at")
                    .table(Run::Table)
                    .col(Run::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Run::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Run {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    Trigger,
    Status,
    StartedAt,
    FinishedAt,
}
