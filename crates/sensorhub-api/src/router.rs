//! Axum router construction.
//!
//! Assembles the REST routes and the live `WebSocket` into a single
//! [`Router`], with CORS restricted to the configured dashboard origin.

use std::sync::Arc;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the CORS layer for a single allowed origin.
///
/// An origin that is not a valid header value allows nothing cross-origin.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = HeaderValue::from_str(origin).map_or_else(
        |e| {
            tracing::warn!(origin, "Invalid CORS origin, cross-origin requests disabled: {e}");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        },
        AllowOrigin::exact,
    );

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /ws` -- live reading feed
/// - `POST /api/sensors/add-sensor-data`
/// - `GET /api/sensors/filter/sensor-readings`
/// - `GET /api/sensors/get-all-sensors`
/// - `GET /api/sensors/get-sensor-readings`
/// - `POST /api/sensors/delete-sensor-readings`
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    let sensors = Router::new()
        .route("/add-sensor-data", post(handlers::add_sensor_data))
        .route(
            "/filter/sensor-readings",
            get(handlers::filter_sensor_readings),
        )
        .route("/get-all-sensors", get(handlers::get_all_sensors))
        .route("/get-sensor-readings", get(handlers::get_sensor_readings))
        .route(
            "/delete-sensor-readings",
            post(handlers::delete_sensor_readings),
        );

    Router::new()
        .route("/ws", get(ws::ws_live))
        .nest("/api/sensors", sensors)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origin)),
        )
        .with_state(state)
}
