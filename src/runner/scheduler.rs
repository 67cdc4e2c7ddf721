use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::{error::Error, time::Duration};
use tokio::time::{sleep, sleep_until, Duration as TokioDuration, Instant};
use tracing::{debug, error, info};

use crate::{
    database::models::{run, run_status::RunStatus, trigger::Trigger},
    runner::recurrence::Recurrence,
};

/// Evaluates the recurrence rule and creates one pending run per firing.
///
/// The scheduler only creates runs; it never looks at what the workers are
/// doing, so a firing that lands while another run is still executing simply
/// queues up behind it (or alongside it, with more than one worker).
pub struct Scheduler {
    db: DatabaseConnection,
    recurrence: Recurrence,
}

impl Scheduler {
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(db: DatabaseConnection, recurrence: Recurrence) -> Self {
        Self { db, recurrence }
    }

    pub async fn run(&self) {
        info!(
            "📅 Scheduler started: `{}` in {}",
            self.recurrence.expression(),
            self.recurrence.timezone(),
        );

        loop {
            match self.execute_next_firing().await {
                Ok(()) => {
                    debug!("📅 Created scheduled run");
                }
                Err(e) => {
                    error!("❌ Failed to create scheduled run: {}", e);
                }
            }
        }
    }

    /// Sleep until the next fire instant, then create a pending run.
    async fn execute_next_firing(&self) -> Result<(), Box<dyn Error>> {
        let now = chrono::Utc::now();

        let Some(fire_instant) = self.recurrence.next_after(now) else {
            error!("❌ Recurrence rule has no upcoming fire instant");
            // Sleep for a minute and try again
            sleep(TokioDuration::from_secs(60)).await;
            return Ok(());
        };

        debug!(
            "🔄 Next firing at {}",
            fire_instant
                .with_timezone(&self.recurrence.timezone())
                .format("%Y-%m-%d %H:%M:%S %Z")
        );

        wait_until_fire_instant(fire_instant, now).await;

        create_scheduled_run(&self.db).await
    }
}

/// Wait until the specified fire instant
async fn wait_until_fire_instant(
    fire_instant: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) {
    let sleep_duration = (fire_instant - now).to_std().unwrap_or_default();
    if sleep_duration > Duration::ZERO {
        let tokio_instant = Instant::now() + sleep_duration;
        sleep_until(tokio_instant).await;
    }
}

/// Create a pending run in the database
async fn create_scheduled_run(db: &DatabaseConnection) -> Result<(), Box<dyn Error>> {
    let now = chrono::Utc::now().naive_utc();

    let new_run = run::ActiveModel {
        id: Set(uuid::Uuid::new_v4()),
        created_at: Set(now),
        updated_at: Set(now),
        trigger: Set(Trigger::Scheduled),
        status: Set(RunStatus::Pending),
        started_at: Set(None),
        finished_at: Set(None),
    };

    new_run.insert(db).await?;
    Ok(())
}
