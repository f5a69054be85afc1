//! Telemetry store for the sensor hub.
//!
//! Readings are persisted through the [`ReadingStore`] trait. `PostgreSQL`
//! is the durable backend; an in-memory backend serves tests and local runs
//! that have no database.
//!
//! # Modules
//!
//! - [`store`] -- The store contract, filter predicate, and page type
//! - [`reading_store`] -- `PostgreSQL` implementation over `sensor_readings`
//! - [`memory`] -- In-memory implementation
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod postgres;
pub mod reading_store;
pub mod store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use memory::MemoryReadingStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use reading_store::{PgReadingStore, ReadingRow};
pub use store::{ReadingFilter, ReadingPage, ReadingStore};
