use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder as _, QuerySelect as _,
};
use std::time::Duration;
use tokio::{spawn, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    app::App,
    config::{CleanupConfig, RunnerConfig},
    database::models::{
        run::{self, Entity as RunEntity},
        run_status::RunStatus,
        step_kind::StepKind,
    },
    runner::{pipeline::Pipeline, recurrence::Recurrence, scheduler::Scheduler, worker::worker},
};

/// Starts every background task of the runner and keeps them alive.
///
/// There is deliberately no lock around any of this: overlapping runs are
/// allowed, so the only guard the system needs is the per-run claim inside
/// the workers.
pub async fn run_supervisor(
    runner_config: RunnerConfig,
    app: App,
    pipeline: Pipeline,
    recurrence: Recurrence,
) {
    assert!(
        runner_config.workers >= 1,
        "runner.workers must be at least 1, otherwise no run would ever execute"
    );

    start_workers(&runner_config, &app, &pipeline);
    start_scheduler(&app.db, recurrence);
    start_reaper(&runner_config, &app.db);
    start_cleanup_task(&runner_config.cleanup, &app.db);

    // Keep the supervisor running
    run_supervisor_loop().await;
}

/// Start the configured number of worker tasks
fn start_workers(config: &RunnerConfig, app: &App, pipeline: &Pipeline) {
    info!("🚀 Starting {} run worker(s)", config.workers);

    for worker_id in 0..config.workers {
        let worker_instance_name = format!("runner-{worker_id}");
        let config_clone = config.clone();
        let app_clone = app.clone();
        let pipeline_clone = pipeline.clone();

        spawn(async move {
            run_worker_with_restart(&worker_instance_name, &config_clone, app_clone, pipeline_clone)
                .await;
        });
    }
}

/// Run a worker with automatic restart on crash
async fn run_worker_with_restart(
    worker_instance_name: &str,
    runner_config: &RunnerConfig,
    app: App,
    pipeline: Pipeline,
) {
    let mut restart_count = 0;
    loop {
        debug!(
            "Starting worker '{}' (restart #{})",
            worker_instance_name, restart_count
        );

        let worker_app = app.clone();
        if let Err(e) = worker(worker_instance_name, runner_config, worker_app, &pipeline).await {
            error!(
                "💥 Worker '{}' crashed (restart #{}) - error: {}",
                worker_instance_name, restart_count, e
            );
        }

        restart_count += 1;

        sleep(Duration::from_secs(10)).await;
    }
}

/// Start the scheduler task
fn start_scheduler(db: &DatabaseConnection, recurrence: Recurrence) {
    let scheduler_db = db.clone();

    spawn(async move {
        info!("📅 Starting run scheduler");
        let scheduler = Scheduler::new(scheduler_db, recurrence);
        scheduler.run().await;
    });
}

/// Keep the supervisor running indefinitely
async fn run_supervisor_loop() {
    loop {
        sleep(Duration::from_secs(3600)).await;
    }
}

/// Start the abandoned-run reaper task
fn start_reaper(config: &RunnerConfig, db: &DatabaseConnection) {
    let reaper_config = config.clone();
    let reaper_db = db.clone();

    spawn(async move {
        info!("🥀 Starting abandoned-run reaper");
        run_reaper_loop(&reaper_config, &reaper_db).await;
    });
}

async fn run_reaper_loop(config: &RunnerConfig, db: &DatabaseConnection) {
    loop {
        match reap_abandoned_runs(config, db).await {
            Ok(reaped_count) => {
                if reaped_count > 0 {
                    info!("🥀 Reaped {} abandoned run(s)", reaped_count);
                }
            }
            Err(e) => {
                error!("❌ Failed to reap abandoned runs: {}", e);
            }
        }

        // Check for abandoned runs every 5 minutes
        sleep(Duration::from_secs(300)).await;
    }
}

/// Marks runs failed whose worker disappeared (daemon crash, kill -9).
///
/// The threshold is twice the whole pipeline's step budget, so a slow but
/// live run is never reaped. Reaped runs are not re-queued: runs are never
/// retried.
async fn reap_abandoned_runs(config: &RunnerConfig, db: &DatabaseConnection) -> Result<usize, DbErr> {
    let step_budget = config.step_timeout_seconds * StepKind::SEQUENCE.len() as u64;
    let threshold_seconds = i64::try_from(step_budget * 2).unwrap_or(i64::MAX);
    let cutoff_time =
        chrono::Utc::now().naive_utc() - chrono::Duration::seconds(threshold_seconds);

    let abandoned = RunEntity::find()
        .filter(run::Column::Status.is_in([
            RunStatus::Provisioning,
            RunStatus::Installing,
            RunStatus::Running,
        ]))
        .filter(run::Column::UpdatedAt.lte(cutoff_time))
        .all(db)
        .await?;

    let mut reaped_count = 0;
    for stale_run in abandoned {
        let active_duration = chrono::Utc::now()
            .naive_utc()
            .signed_duration_since(stale_run.updated_at);

        warn!(
            "🥀 Reaping abandoned run {} ({}) - {} for {}s (threshold: {}s)",
            stale_run.id,
            stale_run.trigger,
            stale_run.status,
            active_duration.num_seconds(),
            threshold_seconds
        );

        let now = chrono::Utc::now().naive_utc();
        RunEntity::update_many()
            .col_expr(run::Column::Status, Expr::value(RunStatus::Failed))
            .col_expr(run::Column::FinishedAt, Expr::value(Some(now)))
            .col_expr(run::Column::UpdatedAt, Expr::value(now))
            .filter(run::Column::Id.eq(stale_run.id))
            .filter(run::Column::Status.eq(stale_run.status))
            .exec(db)
            .await?;
        reaped_count += 1;
    }

    Ok(reaped_count)
}

/// Start the run cleanup task
fn start_cleanup_task(config: &CleanupConfig, db: &DatabaseConnection) {
    let cleanup_config = config.clone();
    let cleanup_db = db.clone();

    spawn(async move {
        info!("🧹 Starting run cleanup task");
        run_cleanup_loop(&cleanup_config, &cleanup_db).await;
    });
}

async fn run_cleanup_loop(config: &CleanupConfig, db: &DatabaseConnection) {
    loop {
        if let Err(e) = cleanup_old_runs(config, db).await {
            error!("🧹 Failed to clean up old runs: {}", e);
        }

        // Wait for the configured interval between cleanup runs
        sleep(Duration::from_secs(config.interval_seconds)).await;
    }
}

/// Delete terminal runs past their retention window; step executions follow
/// via the cascading foreign key.
async fn cleanup_old_runs(config: &CleanupConfig, db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = chrono::Utc::now().naive_utc();

    let succeeded_cutoff = now
        - chrono::Duration::seconds(
            config
                .succeeded_retention_seconds
                .try_into()
                .unwrap_or(7200),
        );
    let failed_cutoff = now
        - chrono::Duration::seconds(
            config
                .failed_retention_seconds
                .try_into()
                .unwrap_or(172_800),
        );

    cleanup_runs_by_status(db, RunStatus::Succeeded, succeeded_cutoff, config.batch_size).await?;
    cleanup_runs_by_status(db, RunStatus::Failed, failed_cutoff, config.batch_size).await?;

    Ok(())
}

async fn cleanup_runs_by_status(
    db: &DatabaseConnection,
    status: RunStatus,
    cutoff_time: chrono::NaiveDateTime,
    batch_size: usize,
) -> Result<(), DbErr> {
    loop {
        let old_runs = RunEntity::find()
            .filter(run::Column::Status.eq(status))
            .filter(run::Column::CreatedAt.lte(cutoff_time))
            .order_by_asc(run::Column::CreatedAt)
            .limit(batch_size as u64)
            .all(db)
            .await?;

        if old_runs.is_empty() {
            break; // No more runs to clean up
        }

        let run_ids: Vec<uuid::Uuid> = old_runs.iter().map(|r| r.id).collect();
        let batch_count = run_ids.len();

        RunEntity::delete_many()
            .filter(run::Column::Id.is_in(run_ids))
            .exec(db)
            .await?;

        debug!("🧹 Deleted batch of {} old runs", batch_count);

        // Small delay between batches to avoid overwhelming the database
        sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}
