//! Shared type definitions for the sensor hub telemetry service.
//!
//! This crate is the single source of truth for the reading model used
//! across the workspace. Types flow downstream to `TypeScript` via `ts-rs`
//! for the dashboard client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for readings and subscribers
//! - [`structs`] -- Parameter and reading structs
//! - [`events`] -- Live event wire format

pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use events::LiveEvent;
pub use ids::{ReadingId, SubscriberId};
pub use structs::{NewReading, Parameter, StoredReading};
