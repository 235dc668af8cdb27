pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{ingest::IngestService, query::ReadingQueryEngine};
use handlers::ApiDoc;

/// Everything a handler may touch. Built once in `main`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: ReadingQueryEngine,
    pub ingest: IngestService,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/readings", get(handlers::get_readings))
        .route("/sensors/{sensor_id}", get(handlers::get_sensor))
        .route("/push/{adapter}", post(handlers::push))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
