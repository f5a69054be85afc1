//! The telemetry store contract.
//!
//! [`ReadingStore`] is the seam between the pipeline and the durable
//! medium. Two backends implement it: [`PgReadingStore`] for production and
//! [`MemoryReadingStore`] for tests and local runs without a database.
//!
//! Ordering contract shared by every backend: newest first by timestamp,
//! ties broken by insertion order, most recently inserted first.
//!
//! [`PgReadingStore`]: crate::reading_store::PgReadingStore
//! [`MemoryReadingStore`]: crate::memory::MemoryReadingStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sensorhub_types::{NewReading, StoredReading};

use crate::error::DbError;

/// Filter predicate for history queries.
///
/// Matches `sensor_id == sensor_id AND timestamp >= start AND
/// timestamp <= end`, where absent bounds are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingFilter {
    /// Sensor whose readings are wanted.
    pub sensor_id: String,
    /// Inclusive lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<Utc>>,
}

impl ReadingFilter {
    /// Filter on a sensor with no time bounds.
    pub fn sensor(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            start: None,
            end: None,
        }
    }

    /// Restrict to readings at or after `start`.
    #[must_use]
    pub const fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Restrict to readings at or before `end`.
    #[must_use]
    pub const fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Whether a stored reading satisfies the predicate.
    pub fn matches(&self, reading: &StoredReading) -> bool {
        if reading.sensor_id != self.sensor_id {
            return false;
        }
        if let Some(start) = self.start
            && reading.timestamp < start
        {
            return false;
        }
        if let Some(end) = self.end
            && reading.timestamp > end
        {
            return false;
        }
        true
    }
}

/// One page of a filtered query.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingPage {
    /// Number of readings matching the filter before pagination.
    pub total: u64,
    /// The requested slice, newest first.
    pub readings: Vec<StoredReading>,
}

/// Durable, append-mostly collection of readings.
///
/// Every method either fully applies or fails with a [`DbError`]; there is
/// no partial insert and no partial delete.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist a reading, assigning its id and (if absent) its timestamp.
    async fn insert(&self, reading: NewReading) -> Result<StoredReading, DbError>;

    /// The `limit` most recent readings across all sensors, newest first.
    async fn list_recent(&self, limit: u64) -> Result<Vec<StoredReading>, DbError>;

    /// Distinct sensor ids across all stored readings, in no particular order.
    async fn list_sensor_ids(&self) -> Result<Vec<String>, DbError>;

    /// Count all readings matching `filter` and return the page starting at
    /// `offset`, at most `limit` long. Count and page come from the same
    /// consistent view of the data.
    async fn query(
        &self,
        filter: &ReadingFilter,
        offset: u64,
        limit: u64,
    ) -> Result<ReadingPage, DbError>;

    /// Remove every reading. Returns how many were removed.
    async fn delete_all(&self) -> Result<u64, DbError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sensorhub_types::{Parameter, ReadingId};

    fn reading(sensor: &str, at: &str) -> StoredReading {
        StoredReading {
            id: ReadingId::new(),
            sensor_id: sensor.to_owned(),
            params: vec![Parameter::new("temp", 20.0, "C")],
            timestamp: at.parse().unwrap(),
        }
    }

    #[test]
    fn filter_bounds_are_inclusive() {
        let start: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
        let end: DateTime<Utc> = "2024-01-02T00:00:00Z".parse().unwrap();
        let filter = ReadingFilter::sensor("s1").since(start).until(end);

        assert!(filter.matches(&reading("s1", "2024-01-01T00:00:00Z")));
        assert!(filter.matches(&reading("s1", "2024-01-02T00:00:00Z")));
        assert!(!filter.matches(&reading("s1", "2023-12-31T23:59:59Z")));
        assert!(!filter.matches(&reading("s1", "2024-01-02T00:00:01Z")));
    }

    #[test]
    fn filter_requires_exact_sensor() {
        let filter = ReadingFilter::sensor("s1");
        assert!(filter.matches(&reading("s1", "2024-01-01T00:00:00Z")));
        assert!(!filter.matches(&reading("s10", "2024-01-01T00:00:00Z")));
    }
}
