//! Ingestion coordinator: validate, persist, then broadcast.
//!
//! A reading is only published after the store has acknowledged it, so a
//! live subscriber never sees a reading a history query could not return.
//! A rejected candidate touches neither the store nor the subscribers.

use std::sync::Arc;

use sensorhub_db::{DbError, ReadingStore};
use sensorhub_types::{LiveEvent, StoredReading};
use serde_json::Value;

use crate::live::SubscriberRegistry;
use crate::validation::{ValidationError, validate};

/// Why a reading was not ingested.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The candidate failed validation. Nothing was stored or broadcast.
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// The store failed. Nothing was broadcast.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] DbError),
}

/// Runs the write path shared by every producer.
#[derive(Clone)]
pub struct IngestCoordinator {
    store: Arc<dyn ReadingStore>,
    registry: Arc<SubscriberRegistry>,
}

impl IngestCoordinator {
    /// Create a coordinator over a shared store and subscriber registry.
    pub const fn new(store: Arc<dyn ReadingStore>, registry: Arc<SubscriberRegistry>) -> Self {
        Self { store, registry }
    }

    /// Validate a raw request body, persist it, and broadcast it.
    pub async fn ingest(&self, candidate: &Value) -> Result<StoredReading, IngestError> {
        let reading = validate(candidate).inspect_err(|e| {
            tracing::debug!(errors = e.messages().len(), "Rejected reading");
        })?;

        let stored = self.store.insert(reading).await.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to store reading");
        })?;

        let delivered = self
            .registry
            .publish(&LiveEvent::NewReading(stored.clone()));
        tracing::info!(
            reading = %stored.id,
            sensor = %stored.sensor_id,
            params = stored.params.len(),
            delivered,
            "Reading ingested"
        );

        Ok(stored)
    }

    /// Delete every stored reading and tell subscribers.
    ///
    /// Returns the number of readings removed. Nothing is broadcast if the
    /// delete fails.
    pub async fn delete_all_and_notify(&self) -> Result<u64, IngestError> {
        let deleted = self.store.delete_all().await.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to delete readings");
        })?;

        let delivered = self.registry.publish(&LiveEvent::AllDeleted);
        tracing::warn!(deleted, delivered, "All readings deleted");

        Ok(deleted)
    }
}
