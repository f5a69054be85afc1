//! HTTP API server for the sensor hub.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** under `/api/sensors` for ingesting readings,
//!   querying history, listing sensors, and bulk deletion
//! - **`WebSocket` endpoint** (`/ws`) streaming an initial snapshot and
//!   then every new reading and bulk delete as it happens
//!
//! # Architecture
//!
//! Handlers are thin: each decodes the request, calls one service on the
//! shared [`AppState`], and maps the result through [`ApiError`]. Live
//! delivery goes through the core subscriber registry, so a slow
//! `WebSocket` client never holds up ingestion.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
