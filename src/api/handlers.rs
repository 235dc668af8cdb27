use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use utoipa::OpenApi;
use uuid::Uuid;

use super::{dto::ErrorResponse, errors::AppError, AppState};
use crate::{
    db::models::{AggregatedBucket, ReadingRecord, Sensor, SensorType},
    ingest::IngestSummary,
    query::{ReadingsParams, ReadingsResponse},
};

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Query readings. Without `aggregate` this returns raw readings (or the
/// latest reading per sensor with `latest=true`); with `aggregate` it
/// returns time buckets. Both shapes share the pagination envelope.
#[utoipa::path(
    get,
    path = "/readings",
    params(ReadingsParams),
    responses(
        (status = 200, description = "Paginated readings or buckets", body = ReadingsResponse),
        (status = 400, description = "Invalid query parameter", body = ErrorResponse),
        (status = 504, description = "Query deadline exceeded", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "readings"
)]
pub async fn get_readings(
    State(state): State<AppState>,
    Query(params): Query<ReadingsParams>,
) -> Result<Json<ReadingsResponse>, AppError> {
    let request = params.validate()?;
    Ok(Json(state.engine.execute(&request).await?))
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/sensors/{sensor_id}",
    params(
        ("sensor_id" = Uuid, Path, description = "Sensor UUID"),
    ),
    responses(
        (status = 200, description = "Sensor metadata", body = Sensor),
        (status = 404, description = "No such sensor", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "sensors"
)]
pub async fn get_sensor(
    State(state): State<AppState>,
    Path(sensor_id): Path<Uuid>,
) -> Result<Json<Sensor>, AppError> {
    Ok(Json(state.engine.sensor(sensor_id).await?))
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Hand a station payload to the named push adapter. Sensors are upserted
/// and readings appended for the station the payload identifies.
#[utoipa::path(
    post,
    path = "/push/{adapter}",
    params(
        ("adapter" = String, Path, description = "Push adapter name, e.g. `json`"),
    ),
    request_body(content = String, description = "Adapter-specific payload"),
    responses(
        (status = 200, description = "Payload ingested", body = IngestSummary),
        (status = 400, description = "Malformed payload", body = ErrorResponse),
        (status = 404, description = "Unknown adapter or station", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "ingest"
)]
pub async fn push(
    State(state): State<AppState>,
    Path(adapter): Path<String>,
    body: Bytes,
) -> Result<Json<IngestSummary>, AppError> {
    Ok(Json(state.ingest.push(&adapter, &body).await?))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(get_readings, get_sensor, push, health),
    components(schemas(
        ReadingsResponse,
        ReadingRecord,
        AggregatedBucket,
        Sensor,
        SensorType,
        IngestSummary,
        ErrorResponse
    )),
    tags(
        (name = "readings", description = "Reading queries and aggregation"),
        (name = "sensors",  description = "Sensor metadata"),
        (name = "ingest",   description = "Station push endpoints"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "Weather Readings API",
        version = "0.1.0",
        description = "Query and aggregate weather station readings"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
