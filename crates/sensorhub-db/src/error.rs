//! Storage error type.
//!
//! Every [`DbError`] means the store could not serve the request. Callers
//! above this crate do not distinguish between variants; they report the
//! store as unavailable and let the client retry.

/// A store operation failed.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The database rejected or could not run a statement.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Applying a schema migration failed.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored parameter array could not be encoded or decoded.
    #[error("parameter encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store settings are unusable (e.g. a malformed URL).
    #[error("invalid store configuration: {0}")]
    Config(String),
}
