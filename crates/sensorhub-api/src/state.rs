//! Shared application state for the API server.
//!
//! [`AppState`] bundles the three services handlers call into. All three
//! share one store and one subscriber registry, built once at startup.

use std::sync::Arc;

use sensorhub_core::config::HubConfig;
use sensorhub_core::{IngestCoordinator, LiveChannel, QueryEngine, SubscriberRegistry};
use sensorhub_db::ReadingStore;

/// Number of readings returned by `GET /api/sensors/get-sensor-readings`.
pub const RECENT_READINGS_LIMIT: u64 = 1000;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Write path: validate, persist, broadcast.
    pub ingest: IngestCoordinator,
    /// Read path: filtered, paginated history.
    pub query: QueryEngine,
    /// Live subscriptions with connect-time snapshot.
    pub live: LiveChannel,
}

impl AppState {
    /// Wire the services over a shared store and registry.
    pub fn new(
        store: Arc<dyn ReadingStore>,
        registry: Arc<SubscriberRegistry>,
        config: &HubConfig,
    ) -> Self {
        Self {
            ingest: IngestCoordinator::new(Arc::clone(&store), Arc::clone(&registry)),
            query: QueryEngine::new(Arc::clone(&store), &config.query),
            live: LiveChannel::new(registry, store, config.live.snapshot_size),
        }
    }

    /// Build state with a fresh registry sized from `config.live`.
    pub fn with_store(store: Arc<dyn ReadingStore>, config: &HubConfig) -> Self {
        let registry = Arc::new(SubscriberRegistry::new(
            config.live.subscriber_capacity,
            config.live.overflow,
        ));
        Self::new(store, registry, config)
    }

    /// The shared subscriber registry.
    pub const fn registry(&self) -> &Arc<SubscriberRegistry> {
        self.live.registry()
    }
}
