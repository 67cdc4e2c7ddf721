use std::process;

use crate::{
    config::Config, database::models::trigger::Trigger, database::setup_database_connection,
    run_queue::RunQueue,
};

/// Create one pending manual run and exit. A running `relais serve` instance
/// picks it up; the command does not wait for the run to execute.
pub async fn handle_dispatch_command(config: &Config) {
    let db = setup_database_connection(&config.database).await;

    match RunQueue::database().add(&db, Trigger::Manual).await {
        Ok(run_id) => {
            println!("🚀 Dispatched manual run {run_id}");
            println!("   (inspect it with `relais runs show {run_id}`)");
        }
        Err(e) => {
            eprintln!("❌ Failed to dispatch run: {e}");
            process::exit(1);
        }
    }
}
