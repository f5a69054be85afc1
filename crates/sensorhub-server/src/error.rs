//! Error types for the sensor hub binary.
//!
//! [`HubError`] is the top-level error type that wraps every failure mode
//! during startup and serving.

/// Top-level error for the sensor hub binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: sensorhub_core::ConfigError,
    },

    /// Connecting to or migrating the store failed.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying database error.
        #[from]
        source: sensorhub_db::DbError,
    },

    /// The HTTP server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: sensorhub_api::ServerError,
    },
}
