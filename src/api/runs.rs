use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use sea_orm::{EntityTrait, ModelTrait, QueryOrder, QuerySelect};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::app::App;
use crate::database::models::{
    run, run_status::RunStatus, step_execution, step_kind::StepKind, step_outcome::StepOutcome,
    trigger::Trigger,
};

const RECENT_RUNS_LIMIT: u64 = 50;

#[derive(Serialize)]
pub struct DispatchedRunResponse {
    pub id: Uuid,
}

#[derive(Serialize)]
pub struct RunResponse {
    pub id: Uuid,
    pub trigger: Trigger,
    pub status: RunStatus,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
}

impl From<run::Model> for RunResponse {
    fn from(model: run::Model) -> Self {
        Self {
            id: model.id,
            trigger: model.trigger,
            status: model.status,
            created_at: model.created_at,
            started_at: model.started_at,
            finished_at: model.finished_at,
        }
    }
}

#[derive(Serialize)]
pub struct StepExecutionResponse {
    pub step: StepKind,
    pub outcome: StepOutcome,
    pub exit_code: Option<i32>,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
    pub duration_ms: i64,
    pub failure_reason: Option<String>,
}

impl From<step_execution::Model> for StepExecutionResponse {
    fn from(model: step_execution::Model) -> Self {
        Self {
            step: model.step,
            outcome: model.outcome,
            exit_code: model.exit_code,
            started_at: model.started_at,
            finished_at: model.finished_at,
            duration_ms: model.duration_ms,
            failure_reason: model.failure_reason,
        }
    }
}

#[derive(Serialize)]
pub struct RunDetailResponse {
    #[serde(flatten)]
    pub run: RunResponse,
    pub steps: Vec<StepExecutionResponse>,
}

/// `POST /api/runs` — manual dispatch. Creates one pending run and returns
/// immediately; a worker will pick it up.
pub async fn dispatch(
    State(app): State<App>,
) -> Result<(StatusCode, Json<DispatchedRunResponse>), ApiError> {
    let id = app.dispatch_run(Trigger::Manual).await?;
    Ok((StatusCode::ACCEPTED, Json(DispatchedRunResponse { id })))
}

/// `GET /api/runs` — most recent runs first.
pub async fn list(State(app): State<App>) -> Result<Json<Vec<RunResponse>>, ApiError> {
    let runs = run::Entity::find()
        .order_by_desc(run::Column::CreatedAt)
        .limit(RECENT_RUNS_LIMIT)
        .all(&app.db)
        .await?;

    Ok(Json(runs.into_iter().map(RunResponse::from).collect()))
}

/// `GET /api/runs/{id}` — one run and its step executions in order.
pub async fn show(
    State(app): State<App>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunDetailResponse>, ApiError> {
    let run_model = run::Entity::find_by_id(id)
        .one(&app.db)
        .await?
        .ok_or(ApiError::NotFound)?;

    let steps = run_model
        .find_related(step_execution::Entity)
        .order_by_asc(step_execution::Column::StartedAt)
        .all(&app.db)
        .await?;

    Ok(Json(RunDetailResponse {
        run: RunResponse::from(run_model),
        steps: steps.into_iter().map(StepExecutionResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::tests::setup_test::setup_test;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn dispatching_a_run_is_accepted_at_any_time() {
        let test = setup_test().await;

        let first = test.server.post("/api/runs").await;
        let second = test.server.post("/api/runs").await;

        assert_eq!(first.status_code(), StatusCode::ACCEPTED);
        assert_eq!(second.status_code(), StatusCode::ACCEPTED);

        let first_body: serde_json::Value = first.json();
        let second_body: serde_json::Value = second.json();
        assert_ne!(first_body["id"], second_body["id"]);
    }

    #[tokio::test]
    async fn listing_shows_the_dispatched_run_as_pending_and_manual() {
        let test = setup_test().await;

        let dispatched = test.server.post("/api/runs").await;
        let id = dispatched.json::<serde_json::Value>()["id"].clone();

        let listed = test.server.get("/api/runs").await;
        assert_eq!(listed.status_code(), StatusCode::OK);

        let body: serde_json::Value = listed.json();
        let runs = body.as_array().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0]["id"], id);
        assert_eq!(runs[0]["status"], "Pending");
        assert_eq!(runs[0]["trigger"], "Manual");
    }

    #[tokio::test]
    async fn showing_a_dispatched_run_includes_an_empty_step_list() {
        let test = setup_test().await;

        let dispatched = test.server.post("/api/runs").await;
        let id = dispatched.json::<serde_json::Value>()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let shown = test.server.get(&format!("/api/runs/{id}")).await;
        assert_eq!(shown.status_code(), StatusCode::OK);

        let body: serde_json::Value = shown.json();
        assert_eq!(body["id"].as_str().unwrap(), id);
        assert_eq!(body["steps"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn showing_an_unknown_run_is_a_404() {
        let test = setup_test().await;

        let response = test
            .server
            .get("/api/runs/00000000-0000-0000-0000-000000000000")
            .await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn liveness_and_readiness_answer_ok() {
        let test = setup_test().await;

        assert_eq!(test.server.get("/liveness").await.status_code(), StatusCode::OK);
        assert_eq!(test.server.get("/readiness").await.status_code(), StatusCode::OK);
    }
}
