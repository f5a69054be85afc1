//! Ingestion, query, and live broadcast for the sensor hub.
//!
//! This crate owns everything between the wire and the store: turning raw
//! request bodies into typed readings, persisting and broadcasting them,
//! answering filtered history queries, and fanning live events out to
//! connected subscribers.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `sensorhub.yaml` with
//!   environment overrides.
//! - [`validation`] -- Field-level checks on candidate readings.
//! - [`ingest`] -- [`IngestCoordinator`]: validate, persist, broadcast.
//! - [`query`] -- [`QueryEngine`]: filtered, paginated history.
//! - [`live`] -- [`SubscriberRegistry`] and [`LiveChannel`].
//! - [`time`] -- ISO-8601 instant parsing.

pub mod config;
pub mod ingest;
pub mod live;
pub mod query;
pub mod time;
pub mod validation;

pub use config::{ConfigError, HubConfig};
pub use ingest::{IngestCoordinator, IngestError};
pub use live::{LiveChannel, OverflowPolicy, SubscriberRegistry, Subscription};
pub use query::{HistoryPage, HistoryQuery, QueryEngine, QueryError};
pub use validation::{ValidationError, validate};
