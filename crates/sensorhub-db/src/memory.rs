//! In-memory backend for the telemetry store.
//!
//! Backs tests and local runs without a database. Rows are kept in
//! insertion order behind an async [`RwLock`]; every write takes the write
//! lock, so each insert and each delete-all is atomic, and each query reads
//! one consistent view.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sensorhub_types::{NewReading, ReadingId, StoredReading};
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::store::{ReadingFilter, ReadingPage, ReadingStore};

/// Timestamp precision of the durable backend (microseconds), mirrored here
/// so both backends hand out identical readings.
const TIMESTAMP_DIGITS: u16 = 6;

#[derive(Debug, Clone)]
struct MemoryRow {
    seq: u64,
    reading: StoredReading,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_seq: u64,
    rows: Vec<MemoryRow>,
}

/// Process-local reading store.
#[derive(Debug, Clone, Default)]
pub struct MemoryReadingStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryReadingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of readings currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    /// Whether the store holds no readings.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.rows.is_empty()
    }
}

/// Newest first; equal timestamps fall back to most recently inserted.
fn newest_first(a: &MemoryRow, b: &MemoryRow) -> Ordering {
    b.reading
        .timestamp
        .cmp(&a.reading.timestamp)
        .then_with(|| b.seq.cmp(&a.seq))
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn insert(&self, reading: NewReading) -> Result<StoredReading, DbError> {
        let timestamp: DateTime<Utc> = reading
            .timestamp
            .unwrap_or_else(Utc::now)
            .trunc_subsecs(TIMESTAMP_DIGITS);

        let stored = StoredReading {
            id: ReadingId::new(),
            sensor_id: reading.sensor_id,
            params: reading.params,
            timestamp,
        };

        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq = seq.saturating_add(1);
        inner.rows.push(MemoryRow {
            seq,
            reading: stored.clone(),
        });

        tracing::debug!(id = %stored.id, sensor_id = %stored.sensor_id, seq, "Inserted reading");
        Ok(stored)
    }

    async fn list_recent(&self, limit: u64) -> Result<Vec<StoredReading>, DbError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<&MemoryRow> = inner.rows.iter().collect();
        rows.sort_by(|a, b| newest_first(a, b));
        Ok(rows
            .into_iter()
            .take(to_usize(limit))
            .map(|row| row.reading.clone())
            .collect())
    }

    async fn list_sensor_ids(&self) -> Result<Vec<String>, DbError> {
        let inner = self.inner.read().await;
        let ids: BTreeSet<&str> = inner
            .rows
            .iter()
            .map(|row| row.reading.sensor_id.as_str())
            .collect();
        Ok(ids.into_iter().map(str::to_owned).collect())
    }

    async fn query(
        &self,
        filter: &ReadingFilter,
        offset: u64,
        limit: u64,
    ) -> Result<ReadingPage, DbError> {
        let inner = self.inner.read().await;
        let mut matching: Vec<&MemoryRow> = inner
            .rows
            .iter()
            .filter(|row| filter.matches(&row.reading))
            .collect();
        matching.sort_by(|a, b| newest_first(a, b));

        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let readings = matching
            .into_iter()
            .skip(to_usize(offset))
            .take(to_usize(limit))
            .map(|row| row.reading.clone())
            .collect();

        Ok(ReadingPage { total, readings })
    }

    async fn delete_all(&self) -> Result<u64, DbError> {
        let mut inner = self.inner.write().await;
        let deleted = u64::try_from(inner.rows.len()).unwrap_or(u64::MAX);
        inner.rows.clear();
        tracing::info!(deleted, "Deleted all readings");
        Ok(deleted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;
    use sensorhub_types::Parameter;

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    fn temp(sensor: &str, value: f64) -> NewReading {
        NewReading::new(sensor, vec![Parameter::new("temp", value, "C")])
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamp() {
        let store = MemoryReadingStore::new();
        let before = Utc::now().trunc_subsecs(TIMESTAMP_DIGITS);
        let stored = store.insert(temp("s1", 21.5)).await.unwrap();

        assert!(stored.timestamp >= before);
        assert_eq!(stored.sensor_id, "s1");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn supplied_timestamp_is_kept() {
        let store = MemoryReadingStore::new();
        let ts = at("2024-03-01T12:00:00.123456Z");
        let stored = store
            .insert(temp("s1", 1.0).with_timestamp(ts))
            .await
            .unwrap();
        assert_eq!(stored.timestamp, ts);
    }

    #[tokio::test]
    async fn out_of_order_timestamps_are_sorted() {
        let store = MemoryReadingStore::new();
        store
            .insert(temp("s1", 2.0).with_timestamp(at("2024-01-02T00:00:00Z")))
            .await
            .unwrap();
        store
            .insert(temp("s1", 1.0).with_timestamp(at("2024-01-01T00:00:00Z")))
            .await
            .unwrap();
        store
            .insert(temp("s1", 3.0).with_timestamp(at("2024-01-03T00:00:00Z")))
            .await
            .unwrap();

        let page = store
            .query(&ReadingFilter::sensor("s1"), 0, 10)
            .await
            .unwrap();
        let values: Vec<f64> = page.readings.iter().map(|r| r.params[0].value).collect();
        assert_eq!(values, vec![3.0, 2.0, 1.0]);
    }

    #[tokio::test]
    async fn equal_timestamps_break_ties_by_insertion_reverse() {
        let store = MemoryReadingStore::new();
        let ts = at("2024-01-01T00:00:00Z");
        let mut ids = Vec::new();
        for i in 0..5 {
            let stored = store
                .insert(temp("s1", f64::from(i)).with_timestamp(ts))
                .await
                .unwrap();
            ids.push(stored.id);
        }
        ids.reverse();

        for _ in 0..3 {
            let page = store
                .query(&ReadingFilter::sensor("s1"), 0, 10)
                .await
                .unwrap();
            let got: Vec<ReadingId> = page.readings.iter().map(|r| r.id).collect();
            assert_eq!(got, ids);
        }
    }

    #[tokio::test]
    async fn query_counts_before_paginating() {
        let store = MemoryReadingStore::new();
        for i in 0..7 {
            store.insert(temp("s1", f64::from(i))).await.unwrap();
        }
        store.insert(temp("s2", 99.0)).await.unwrap();

        let filter = ReadingFilter::sensor("s1");
        let first = store.query(&filter, 0, 3).await.unwrap();
        let last = store.query(&filter, 6, 3).await.unwrap();
        let beyond = store.query(&filter, 30, 3).await.unwrap();

        assert_eq!(first.total, 7);
        assert_eq!(first.readings.len(), 3);
        assert_eq!(last.total, 7);
        assert_eq!(last.readings.len(), 1);
        assert_eq!(beyond.total, 7);
        assert!(beyond.readings.is_empty());
    }

    #[tokio::test]
    async fn query_applies_time_bounds() {
        let store = MemoryReadingStore::new();
        for day in 1..=5 {
            let ts = at(&format!("2024-01-0{day}T00:00:00Z"));
            store
                .insert(temp("s1", f64::from(day)).with_timestamp(ts))
                .await
                .unwrap();
        }

        let filter = ReadingFilter::sensor("s1")
            .since(at("2024-01-02T00:00:00Z"))
            .until(at("2024-01-04T00:00:00Z"));
        let page = store.query(&filter, 0, 10).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.readings[0].params[0].value, 4.0);
        assert_eq!(page.readings[2].params[0].value, 2.0);
    }

    #[tokio::test]
    async fn list_recent_spans_sensors_and_is_bounded() {
        let store = MemoryReadingStore::new();
        for i in 0..15 {
            let sensor = if i % 2 == 0 { "even" } else { "odd" };
            store.insert(temp(sensor, f64::from(i))).await.unwrap();
        }

        let recent = store.list_recent(10).await.unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].params[0].value, 14.0);
        assert_eq!(recent[9].params[0].value, 5.0);
    }

    #[tokio::test]
    async fn sensor_ids_are_distinct() {
        let store = MemoryReadingStore::new();
        store.insert(temp("b", 1.0)).await.unwrap();
        store.insert(temp("a", 1.0)).await.unwrap();
        store.insert(temp("b", 2.0)).await.unwrap();

        let mut ids = store.list_sensor_ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[tokio::test]
    async fn delete_all_reports_count_and_empties() {
        let store = MemoryReadingStore::new();
        store.insert(temp("s1", 1.0)).await.unwrap();
        store.insert(temp("s2", 1.0)).await.unwrap();

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.is_empty().await);
        assert!(store.list_sensor_ids().await.unwrap().is_empty());
        assert_eq!(store.delete_all().await.unwrap(), 0);
    }
}
