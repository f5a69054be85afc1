//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/sensors/add-sensor-data` | Ingest one reading |
//! | `GET` | `/api/sensors/filter/sensor-readings` | Filtered, paginated history |
//! | `GET` | `/api/sensors/get-all-sensors` | Distinct sensor ids |
//! | `GET` | `/api/sensors/get-sensor-readings` | Latest readings, all sensors |
//! | `POST` | `/api/sensors/delete-sensor-readings` | Delete every reading |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sensorhub_core::HistoryQuery;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::state::{AppState, RECENT_READINGS_LIMIT};

// ---------------------------------------------------------------------------
// POST /api/sensors/add-sensor-data
// ---------------------------------------------------------------------------

/// Validate, store, and broadcast one reading.
///
/// The body is taken as untyped JSON so the validator can report every
/// field problem at once instead of failing on the first type mismatch.
pub async fn add_sensor_data(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(candidate) = body.map_err(|e| ApiError::MalformedBody(e.body_text()))?;
    let stored = state.ingest.ingest(&candidate).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Data added successfully",
            "id": stored.id,
        })),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/sensors/filter/sensor-readings
// ---------------------------------------------------------------------------

/// Query one sensor's history by time range, one page at a time.
pub async fn filter_sensor_readings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.query.query(&query).await?;
    Ok(Json(page))
}

// ---------------------------------------------------------------------------
// GET /api/sensors/get-all-sensors
// ---------------------------------------------------------------------------

/// List the distinct sensor ids that have stored readings.
pub async fn get_all_sensors(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let ids = state.query.sensor_ids().await?;
    Ok(Json(ids))
}

// ---------------------------------------------------------------------------
// GET /api/sensors/get-sensor-readings
// ---------------------------------------------------------------------------

/// Latest readings across all sensors, newest first.
pub async fn get_sensor_readings(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let readings = state.query.latest(RECENT_READINGS_LIMIT).await?;
    Ok(Json(readings))
}

// ---------------------------------------------------------------------------
// POST /api/sensors/delete-sensor-readings
// ---------------------------------------------------------------------------

/// Delete every stored reading and notify live subscribers.
pub async fn delete_sensor_readings(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.ingest.delete_all_and_notify().await?;
    Ok(Json(json!({
        "message": "All sensor data deleted successfully",
        "deleted": deleted,
    })))
}
