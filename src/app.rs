use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::Config, database::models::trigger::Trigger, environment::Environment,
    run_queue::RunQueue,
};

#[derive(Clone, Debug)]
pub struct App {
    pub config: Config,
    pub environment: Environment,
    pub db: DatabaseConnection,
    pub run_queue: RunQueue,
}

impl App {
    /// Dispatch a run through the configured queue.
    pub async fn dispatch_run(&self, trigger: Trigger) -> Result<Uuid, sea_orm::DbErr> {
        self.run_queue.add(&self.db, trigger).await
    }
}

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("Database connection error")]
    DatabaseError(#[from] sea_orm::DbErr),
}

impl IntoResponse for ReadinessError {
    fn into_response(self) -> Response {
        (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response()
    }
}
