use std::{error::Error, process};

use sea_orm::{DatabaseConnection, EntityTrait, ModelTrait, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::{
    cli::RunsAction,
    config::Config,
    database::models::{run, step_execution},
    database::setup_database_connection,
};

pub async fn handle_runs_command(config: &Config, action: RunsAction) {
    let db = setup_database_connection(&config.database).await;

    let result = match action {
        RunsAction::List { limit } => list_runs(&db, limit).await,
        RunsAction::Show { id } => show_run(&db, id).await,
    };

    if let Err(e) = result {
        eprintln!("❌ {e}");
        process::exit(1);
    }
}

async fn list_runs(db: &DatabaseConnection, limit: u64) -> Result<(), Box<dyn Error>> {
    let runs = run::Entity::find()
        .order_by_desc(run::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?;

    if runs.is_empty() {
        println!("No runs yet");
        return Ok(());
    }

    for run_model in runs {
        println!(
            "{}  {:<12}  {:<9}  created {}",
            run_model.id,
            run_model.status,
            run_model.trigger,
            run_model.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }

    Ok(())
}

async fn show_run(db: &DatabaseConnection, id: Uuid) -> Result<(), Box<dyn Error>> {
    let run_model = run::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| format!("No run with id {id}"))?;

    println!("Run {}  {}  {}", run_model.id, run_model.trigger, run_model.status);
    println!(
        "  created:  {}",
        run_model.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(started) = run_model.started_at {
        println!("  started:  {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(finished) = run_model.finished_at {
        println!("  finished: {}", finished.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    let steps = run_model
        .find_related(step_execution::Entity)
        .order_by_asc(step_execution::Column::StartedAt)
        .all(db)
        .await?;

    if steps.is_empty() {
        println!("  steps:    (none executed yet)");
        return Ok(());
    }

    println!("  steps:");
    for step in steps {
        let exit = step
            .exit_code
            .map_or_else(String::new, |code| format!("(exit {code}) "));
        let reason = step
            .failure_reason
            .map_or_else(String::new, |reason| format!("  {reason}"));
        println!(
            "    {:<16} {:<10} {}{}ms{}",
            step.step, step.outcome, exit, step.duration_ms, reason
        );
    }

    Ok(())
}
