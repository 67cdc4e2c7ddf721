use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::app::App;
use crate::config::RunnerConfig;
use crate::database::models::{
    run::{self, Entity as RunEntity},
    run_status::RunStatus,
    step_execution,
};
use crate::runner::pipeline::Pipeline;
use crate::runner::sandbox::Sandbox;
use crate::runner::step::StepRecord;

pub async fn worker(
    worker_instance_name: &str,
    runner_config: &RunnerConfig,
    app: App,
    pipeline: &Pipeline,
) -> Result<(), DbErr> {
    loop {
        // Try to claim and execute all pending runs (drain the queue)
        let mut runs_processed = 0;
        loop {
            let Some(run_model) = claim_oldest_pending_run(&app.db).await? else {
                if runs_processed > 0 {
                    debug!(
                        "Worker '{}' processed {} run(s), queue drained",
                        worker_instance_name, runs_processed
                    );
                }
                break;
            };

            info!(
                "🔧 Worker '{}' claimed {} run {}",
                worker_instance_name, run_model.trigger, run_model.id
            );

            execute_and_record_run(&run_model, &app, pipeline, worker_instance_name).await?;

            runs_processed += 1;
        }

        // Jittered poll so multiple workers do not hit the queue in lockstep
        let poll = Duration::from_secs(runner_config.poll_interval_seconds)
            + Duration::from_millis(fastrand::u64(0..500));
        sleep(poll).await;
    }
}

/// Claim the oldest pending run.
///
/// The claim is a status-guarded UPDATE, so when several workers race for the
/// same run exactly one wins; the losers see zero affected rows and move on.
/// Nothing here serializes *different* runs: two claimed runs execute
/// concurrently.
async fn claim_oldest_pending_run(db: &DatabaseConnection) -> Result<Option<run::Model>, DbErr> {
    let candidate = RunEntity::find()
        .filter(run::Column::Status.eq(RunStatus::Pending))
        .order_by_asc(run::Column::CreatedAt)
        .one(db)
        .await?;

    let Some(run_model) = candidate else {
        return Ok(None);
    };

    let now = chrono::Utc::now().naive_utc();
    let claimed = RunEntity::update_many()
        .col_expr(run::Column::Status, Expr::value(RunStatus::Provisioning))
        .col_expr(run::Column::StartedAt, Expr::value(Some(now)))
        .col_expr(run::Column::UpdatedAt, Expr::value(now))
        .filter(run::Column::Id.eq(run_model.id))
        .filter(run::Column::Status.eq(RunStatus::Pending))
        .exec(db)
        .await?;

    if claimed.rows_affected == 0 {
        // Lost the race; the next loop iteration will find another candidate.
        return Ok(None);
    }

    Ok(Some(run_model))
}

async fn execute_and_record_run(
    run_model: &run::Model,
    app: &App,
    pipeline: &Pipeline,
    worker_instance_name: &str,
) -> Result<(), DbErr> {
    let start_time = Instant::now();

    let sandbox = match Sandbox::create() {
        Ok(sandbox) => sandbox,
        Err(e) => {
            error!(
                "❌ Worker '{}' could not create a sandbox for run {}: {}",
                worker_instance_name, run_model.id, e
            );
            finalize_run(run_model.id, RunStatus::Failed, &app.db).await?;
            return Ok(());
        }
    };

    // The claim already moved the run to `provisioning`.
    let provision = pipeline
        .run_phase(&sandbox, pipeline.provision_steps())
        .await;
    record_step_executions(run_model.id, &provision.steps, &app.db).await?;
    let mut failed = provision.aborted;

    if !failed {
        set_run_status(run_model.id, RunStatus::Installing, &app.db).await?;
        let install = pipeline.run_phase(&sandbox, pipeline.install_steps()).await;
        record_step_executions(run_model.id, &install.steps, &app.db).await?;
        failed = install.aborted;
    }

    if !failed {
        set_run_status(run_model.id, RunStatus::Running, &app.db).await?;
        let bot = pipeline
            .run_phase(&sandbox, vec![pipeline.bot_step()])
            .await;
        record_step_executions(run_model.id, &bot.steps, &app.db).await?;
        failed = bot.aborted;
    }

    let terminal = if failed {
        RunStatus::Failed
    } else {
        RunStatus::Succeeded
    };
    finalize_run(run_model.id, terminal, &app.db).await?;

    let execution_duration = start_time.elapsed();
    if failed {
        error!(
            "❌ Worker '{}' failed {} run {} in {:?}",
            worker_instance_name, run_model.trigger, run_model.id, execution_duration
        );
    } else {
        info!(
            "✅ Worker '{}' completed {} run {} in {:?}",
            worker_instance_name, run_model.trigger, run_model.id, execution_duration
        );
    }

    // The sandbox drops here, removing the run's working directory whatever
    // the outcome was.
    Ok(())
}

async fn set_run_status(
    run_id: Uuid,
    status: RunStatus,
    db: &DatabaseConnection,
) -> Result<(), DbErr> {
    let now = chrono::Utc::now().naive_utc();
    RunEntity::update_many()
        .col_expr(run::Column::Status, Expr::value(status))
        .col_expr(run::Column::UpdatedAt, Expr::value(now))
        .filter(run::Column::Id.eq(run_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn finalize_run(
    run_id: Uuid,
    status: RunStatus,
    db: &DatabaseConnection,
) -> Result<(), DbErr> {
    let now = chrono::Utc::now().naive_utc();
    RunEntity::update_many()
        .col_expr(run::Column::Status, Expr::value(status))
        .col_expr(run::Column::FinishedAt, Expr::value(Some(now)))
        .col_expr(run::Column::UpdatedAt, Expr::value(now))
        .filter(run::Column::Id.eq(run_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn record_step_executions(
    run_id: Uuid,
    records: &[StepRecord],
    db: &DatabaseConnection,
) -> Result<(), DbErr> {
    for record in records {
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = i64::try_from(record.duration.as_millis()).unwrap_or(i64::MAX);

        let execution = step_execution::ActiveModel {
            id: Set(Uuid::new_v4()),
            run_id: Set(run_id),
            step: Set(record.step),
            outcome: Set(record.outcome),
            exit_code: Set(record.exit_code),
            started_at: Set(record.started_at),
            finished_at: Set(record.finished_at),
            duration_ms: Set(duration_ms),
            failure_reason: Set(record.failure_reason.clone()),
            created_at: Set(chrono::Utc::now().naive_utc()),
        };
        execution.insert(db).await?;
    }
    Ok(())
}
