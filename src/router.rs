use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{api, app::App};

pub fn router(app: App) -> Router {
    let api_router = Router::new()
        .route("/runs", get(api::runs::list).post(api::runs::dispatch))
        .route("/runs/{id}", get(api::runs::show))
        .with_state(app.clone());

    Router::new()
        .route("/liveness", get(api::health_checks::ok))
        .route("/readiness", get(api::health_checks::readiness))
        .with_state(app)
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
}
