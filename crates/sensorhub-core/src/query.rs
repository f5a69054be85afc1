//! History query engine.
//!
//! Turns the external query parameters (`sensorId`, `startDate`, `endDate`,
//! `page`, `limit`, all strings off a URL) into a [`ReadingFilter`] plus an
//! offset/limit window, and runs it against the store. The store's count and
//! page are returned unchanged, alongside the page and limit actually used.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sensorhub_db::{DbError, ReadingFilter, ReadingStore};
use sensorhub_types::StoredReading;
use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;
use crate::time::parse_instant;

/// Raw history query as received from a client.
///
/// Field names match the query string (`?sensorId=..&startDate=..`).
/// Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Sensor to query. Required.
    pub sensor_id: Option<String>,
    /// Inclusive lower time bound (ISO-8601).
    pub start_date: Option<String>,
    /// Inclusive upper time bound (ISO-8601).
    pub end_date: Option<String>,
    /// 1-based page number.
    pub page: Option<String>,
    /// Page size.
    pub limit: Option<String>,
}

impl HistoryQuery {
    /// Query for a sensor with default paging and no time bounds.
    pub fn sensor(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: Some(sensor_id.into()),
            ..Self::default()
        }
    }

    /// Set the page and limit.
    #[must_use]
    pub fn paged(mut self, page: u64, limit: u64) -> Self {
        self.page = Some(page.to_string());
        self.limit = Some(limit.to_string());
        self
    }

    /// Set the time bounds.
    #[must_use]
    pub fn between(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.start_date = start.map(str::to_owned);
        self.end_date = end.map(str::to_owned);
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    /// Readings matching the filter across all pages.
    pub total: u64,
    /// This page, newest first.
    pub data: Vec<StoredReading>,
    /// The 1-based page number used.
    pub page: u64,
    /// The page size used.
    pub limit: u64,
}

/// Errors returned by the query engine.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// No sensor id was supplied.
    #[error("Sensor ID is required")]
    MissingSensorId,

    /// A time bound could not be parsed, or the range is inverted.
    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    /// `page` or `limit` is not a non-negative integer.
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),

    /// The store could not serve the query.
    #[error("storage unavailable: {0}")]
    Storage(#[from] DbError),
}

/// Filtered, paginated reads over the telemetry store.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn ReadingStore>,
    default_limit: u64,
    max_limit: u64,
}

impl QueryEngine {
    /// Create an engine over `store` with the configured paging limits.
    pub fn new(store: Arc<dyn ReadingStore>, config: &QueryConfig) -> Self {
        let max_limit = config.max_limit.max(1);
        Self {
            store,
            default_limit: config.default_limit.clamp(1, max_limit),
            max_limit,
        }
    }

    /// Run a history query.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MissingSensorId`], [`QueryError::InvalidTimeRange`]
    /// or [`QueryError::InvalidPagination`] for client mistakes, and
    /// [`QueryError::Storage`] if the store fails.
    pub async fn query(&self, query: &HistoryQuery) -> Result<HistoryPage, QueryError> {
        let sensor_id = non_empty(query.sensor_id.as_deref()).ok_or(QueryError::MissingSensorId)?;

        let start = parse_bound("startDate", query.start_date.as_deref())?;
        let end = parse_bound("endDate", query.end_date.as_deref())?;
        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            return Err(QueryError::InvalidTimeRange(format!(
                "startDate {start} is after endDate {end}"
            )));
        }

        let (page, limit) = self.normalize_paging(query.page.as_deref(), query.limit.as_deref())?;
        let offset = page.saturating_sub(1).saturating_mul(limit);

        let filter = ReadingFilter {
            sensor_id: sensor_id.to_owned(),
            start,
            end,
        };
        let result = self.store.query(&filter, offset, limit).await?;

        tracing::debug!(
            sensor_id,
            page,
            limit,
            total = result.total,
            returned = result.readings.len(),
            "History query served"
        );

        Ok(HistoryPage {
            total: result.total,
            data: result.readings,
            page,
            limit,
        })
    }

    /// Resolve `page` and `limit`: page defaults to and never drops below 1;
    /// a missing or zero limit uses the default; limits above the maximum
    /// are clamped.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidPagination`] if either value is not a
    /// non-negative integer.
    pub fn normalize_paging(
        &self,
        page: Option<&str>,
        limit: Option<&str>,
    ) -> Result<(u64, u64), QueryError> {
        let page = parse_count("page", page)?.unwrap_or(1).max(1);
        let limit = match parse_count("limit", limit)? {
            None | Some(0) => self.default_limit,
            Some(n) => n.min(self.max_limit),
        };
        Ok((page, limit))
    }

    /// Distinct sensor ids, sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Storage`] if the store fails.
    pub async fn sensor_ids(&self) -> Result<Vec<String>, QueryError> {
        let mut ids = self.store.list_sensor_ids().await?;
        ids.sort_unstable();
        Ok(ids)
    }

    /// The most recent readings across all sensors, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Storage`] if the store fails.
    pub async fn latest(&self, limit: u64) -> Result<Vec<StoredReading>, QueryError> {
        Ok(self.store.list_recent(limit).await?)
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_bound(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, QueryError> {
    non_empty(raw)
        .map(|s| {
            parse_instant(s).ok_or_else(|| {
                QueryError::InvalidTimeRange(format!("{field} is not a valid ISO-8601 date: {s}"))
            })
        })
        .transpose()
}

fn parse_count(field: &str, raw: Option<&str>) -> Result<Option<u64>, QueryError> {
    non_empty(raw)
        .map(|s| {
            s.parse::<u64>().map_err(|e| {
                QueryError::InvalidPagination(format!("{field} must be a non-negative integer: {e}"))
            })
        })
        .transpose()
}
