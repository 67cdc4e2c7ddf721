use sea_orm_migration::{
    prelude::*,
    schema::{big_integer, integer_null, string, string_null, timestamp, uuid},
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StepExecution::Table)
                    .if_not_exists()
                    .col(uuid(StepExecution::Id).primary_key())
                    .col(uuid(StepExecution::RunId))
                    .col(string(StepExecution::Step))
                    .col(string(StepExecution::Outcome))
                    .col(integer_null(StepExecution::ExitCode))
                    .col(timestamp(StepExecution::StartedAt))
                    .col(timestamp(StepExecution::FinishedAt))
                    .col(big_integer(StepExecution::DurationMs))
                    .col(string_null(StepExecution::FailureReason))
                    .col(timestamp(StepExecution::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-step_execution-run_id")
                            .from(StepExecution::Table, StepExecution::RunId)
                            .to(Run::Table, Run::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-step_execution-run_id")
                    .table(StepExecution::Table)
                    .col(StepExecution::RunId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-step_execution-started_at")
                    .table(StepExecution::Table)
                    .col(StepExecution::StartedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StepExecution::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StepExecution {
    Table,
    Id,
    RunId,
    Step,
    Outcome,
    ExitCode,
    StartedAt,
    FinishedAt,
    DurationMs,
    FailureReason,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Run {
    Table,
    Id,
}
