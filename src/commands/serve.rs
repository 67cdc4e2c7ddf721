use std::net::SocketAddr;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{
    api::health_checks::ok,
    app::App,
    config::Config,
    database::{migrations::Migrator, setup_database},
    environment::Environment,
    router::router,
    run_queue::RunQueue,
    runner::{pipeline::Pipeline, recurrence::Recurrence, supervisor::run_supervisor},
};

pub async fn handle_serve_command(environment: Environment, config: Config) {
    // Validate the recurrence rule before anything touches the network;
    // an unparseable schedule is a fatal configuration error.
    let recurrence = match Recurrence::parse(&config.schedule.expression, &config.schedule.timezone)
    {
        Ok(recurrence) => recurrence,
        Err(e) => {
            error!("❌ Invalid schedule configuration: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.server.port;

    // We start a temporary liveness server so orchestrators see the process
    // as alive while migrations run
    let liveness_server_task = tokio::spawn(start_liveness_server(port));

    let (db, migration_receiver) = setup_database::<Migrator>(&config.database).await;

    // Wait for migrations to complete
    match migration_receiver.await {
        Ok(Ok(())) => {
            info!("✅ Database is ready!");
        }
        Ok(Err(e)) => {
            error!("❌ Database setup failed: {}", e);
            liveness_server_task.abort();
            return;
        }
        Err(_) => {
            error!("❌ Database setup channel closed unexpectedly");
            liveness_server_task.abort();
            return;
        }
    }

    let run_queue = RunQueue::database();

    let app = App {
        config: config.clone(),
        environment,
        db,
        run_queue,
    };

    let pipeline = Pipeline::new(
        config.pipeline.clone(),
        Duration::from_secs(config.runner.step_timeout_seconds),
    );

    // Spawn the scheduler, workers and housekeeping in the background
    tokio::spawn(run_supervisor(
        config.runner,
        app.clone(),
        pipeline,
        recurrence,
    ));

    // Stop the temporary liveness server
    liveness_server_task.abort();
    let _ = liveness_server_task.await;

    // Start the full server
    let router = router(app);
    start_server(router, port).await;
}

// Minimal server that only serves liveness endpoint during migrations
async fn start_liveness_server(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.unwrap();

    let migration_router = Router::new().route("/liveness", get(ok));
    axum::serve(listener, migration_router).await.unwrap();
}

// Full server with all endpoints
async fn start_server(router: Router, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.unwrap();

    info!("🌐 Server starting on http://{}", addr);
    axum::serve(listener, router).await.unwrap();
}
