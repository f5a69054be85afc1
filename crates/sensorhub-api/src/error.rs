//! Error types for the API layer.
//!
//! [`ApiError`] unifies pipeline failures and maps each to the status code
//! and JSON body dashboard clients expect via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sensorhub_core::{IngestError, QueryError};
use serde_json::json;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Ingestion failed (validation or storage).
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// A history query failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The request body was not parseable JSON.
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Ingest(IngestError::Rejected(e)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation Error", "details": e.messages() }),
            ),
            Self::MalformedBody(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation Error", "details": [msg] }),
            ),
            Self::Ingest(IngestError::StorageUnavailable(e)) | Self::Query(QueryError::Storage(e)) => {
                tracing::error!(error = %e, "Request failed on storage");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database error", "details": e.to_string() }),
                )
            }
            Self::Query(QueryError::MissingSensorId) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Sensor ID is required" }),
            ),
            Self::Query(QueryError::InvalidTimeRange(msg)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid time range", "details": msg }),
            ),
            Self::Query(QueryError::InvalidPagination(msg)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid pagination", "details": msg }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
