//! Sensor hub binary.
//!
//! Wires the telemetry store, subscriber registry, and HTTP server
//! together and serves until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `sensorhub.yaml` (or `$SENSORHUB_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect the store and run migrations
//! 4. Create the subscriber registry and application state
//! 5. Serve HTTP and `WebSocket` traffic
//! 6. Close the database pool once the server has drained

mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sensorhub_api::AppState;
use sensorhub_core::config::{HubConfig, LogFormat, LoggingConfig, StorageBackend, StorageConfig};
use sensorhub_core::SubscriberRegistry;
use sensorhub_db::{MemoryReadingStore, PostgresConfig, PostgresPool, ReadingStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::HubError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "sensorhub.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, storage setup, or the server fails.
#[tokio::main]
async fn main() -> Result<(), HubError> {
    // 1. Load configuration. Logging is not up yet, so remember where it
    //    came from and report after init.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        source = %source,
        port = config.server.port,
        backend = ?config.storage.backend,
        "sensorhub-server starting"
    );

    // 3. Connect the store.
    let (store, pool) = connect_store(&config.storage).await?;

    // 4. Registry and state.
    let registry = Arc::new(SubscriberRegistry::new(
        config.live.subscriber_capacity,
        config.live.overflow,
    ));
    info!(
        capacity = registry.capacity(),
        overflow = ?registry.policy(),
        snapshot_size = config.live.snapshot_size,
        "Subscriber registry initialized"
    );
    let state = Arc::new(AppState::new(store, registry, &config));

    // 5. Serve.
    let served = sensorhub_api::start_server(&config.server, state).await;

    // 6. Release storage whether or not the server failed.
    if let Some(pool) = pool {
        pool.close().await;
    }
    served?;

    info!("sensorhub-server stopped");
    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Load configuration from `$SENSORHUB_CONFIG` or `sensorhub.yaml`.
///
/// A missing default file means defaults; a missing file named
/// explicitly is an error. Environment overrides apply either way.
fn load_config() -> Result<(HubConfig, String), HubError> {
    let explicit = std::env::var_os("SENSORHUB_CONFIG").map(PathBuf::from);
    let path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    if explicit.is_some() || path.exists() {
        let config = HubConfig::from_file(&path)?;
        Ok((config, path.display().to_string()))
    } else {
        let mut config = HubConfig::default();
        config.apply_env_overrides();
        Ok((config, String::from("defaults")))
    }
}

/// Build the configured store backend. The pool handle comes back too so
/// it can be closed on shutdown.
async fn connect_store(
    storage: &StorageConfig,
) -> Result<(Arc<dyn ReadingStore>, Option<PostgresPool>), HubError> {
    match storage.backend {
        StorageBackend::Postgres => {
            let pg_config = PostgresConfig::new(&storage.postgres_url)
                .with_max_connections(storage.max_connections)
                .with_acquire_timeout(Duration::from_secs(storage.connect_timeout_secs));
            let pool = PostgresPool::connect(&pg_config).await?;
            pool.run_migrations().await?;
            info!(
                max_connections = storage.max_connections,
                "PostgreSQL store connected and migrated"
            );
            Ok((Arc::new(pool.reading_store()), Some(pool)))
        }
        StorageBackend::Memory => {
            info!("Using in-memory store; readings are lost on restart");
            Ok((Arc::new(MemoryReadingStore::new()), None))
        }
    }
}
