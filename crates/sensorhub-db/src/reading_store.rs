//! `PostgreSQL` backend for the telemetry store.
//!
//! Readings live in the `sensor_readings` table. Parameters are stored as a
//! JSONB array so a reading round-trips with its parameter order intact.
//! `seq` (a `BIGSERIAL`) records insertion order and is the tie-breaker in
//! every `ORDER BY`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sensorhub_types::{NewReading, Parameter, ReadingId, StoredReading};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;
use crate::store::{ReadingFilter, ReadingPage, ReadingStore};

/// Column list shared by every `SELECT`/`RETURNING`.
const READING_COLUMNS: &str = "id, sensor_id, params, recorded_at";

/// Filter predicate shared by the count and page statements.
const FILTER_PREDICATE: &str = "sensor_id = $1
      AND ($2::TIMESTAMPTZ IS NULL OR recorded_at >= $2)
      AND ($3::TIMESTAMPTZ IS NULL OR recorded_at <= $3)";

/// Operations on the `sensor_readings` table.
#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(&self, reading: NewReading) -> Result<StoredReading, DbError> {
        let params = serde_json::to_value(&reading.params)?;

        // Single statement: the row is either fully written or not at all.
        let row = sqlx::query_as::<_, ReadingRow>(&format!(
            "INSERT INTO sensor_readings (id, sensor_id, params, recorded_at)
             VALUES ($1, $2, $3, COALESCE($4, now()))
             RETURNING {READING_COLUMNS}"
        ))
        .bind(ReadingId::new().into_inner())
        .bind(&reading.sensor_id)
        .bind(&params)
        .bind(reading.timestamp)
        .fetch_one(&self.pool)
        .await?;

        let stored = row.into_stored()?;
        tracing::debug!(id = %stored.id, sensor_id = %stored.sensor_id, "Inserted reading");
        Ok(stored)
    }

    async fn list_recent(&self, limit: u64) -> Result<Vec<StoredReading>, DbError> {
        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            "SELECT {READING_COLUMNS}
             FROM sensor_readings
             ORDER BY recorded_at DESC, seq DESC
             LIMIT $1"
        ))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReadingRow::into_stored).collect()
    }

    async fn list_sensor_ids(&self) -> Result<Vec<String>, DbError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT DISTINCT sensor_id FROM sensor_readings")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn query(
        &self,
        filter: &ReadingFilter,
        offset: u64,
        limit: u64,
    ) -> Result<ReadingPage, DbError> {
        // Count and page must see the same rows even while inserts land.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM sensor_readings WHERE {FILTER_PREDICATE}"
        ))
        .bind(&filter.sensor_id)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_one(&mut *tx)
        .await?;

        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            "SELECT {READING_COLUMNS}
             FROM sensor_readings
             WHERE {FILTER_PREDICATE}
             ORDER BY recorded_at DESC, seq DESC
             OFFSET $4
             LIMIT $5"
        ))
        .bind(&filter.sensor_id)
        .bind(filter.start)
        .bind(filter.end)
        .bind(to_i64(offset))
        .bind(to_i64(limit))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let readings = rows
            .into_iter()
            .map(ReadingRow::into_stored)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ReadingPage {
            total: u64::try_from(total).unwrap_or(0),
            readings,
        })
    }

    async fn delete_all(&self) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM sensor_readings")
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected();
        tracing::info!(deleted, "Deleted all readings");
        Ok(deleted)
    }
}

/// A row from the `sensor_readings` table.
///
/// Uses runtime types rather than compile-time checked types to
/// avoid requiring a live database during builds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReadingRow {
    /// Store-assigned reading id.
    pub id: Uuid,
    /// Sensor identifier.
    pub sensor_id: String,
    /// JSONB array of `{name, value, units}` objects.
    pub params: serde_json::Value,
    /// Reading timestamp.
    pub recorded_at: DateTime<Utc>,
}

impl ReadingRow {
    /// Decode the row into the shared reading type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if `params` is not a valid
    /// parameter array.
    pub fn into_stored(self) -> Result<StoredReading, DbError> {
        let params: Vec<Parameter> = serde_json::from_value(self.params)?;
        Ok(StoredReading {
            id: ReadingId::from(self.id),
            sensor_id: self.sensor_id,
            params,
            timestamp: self.recorded_at,
        })
    }
}

/// Postgres has no unsigned integers; clamp instead of wrapping.
fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
