//! Reading and parameter structs.
//!
//! A [`NewReading`] is what the validator admits: typed, checked, not yet
//! persisted. A [`StoredReading`] is what the store hands back after a
//! successful insert and what every consumer (queries, live subscribers)
//! sees. Neither is ever mutated once built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::ReadingId;

// ---------------------------------------------------------------------------
// Parameter
// ---------------------------------------------------------------------------

/// A single named, unit-tagged numeric measurement within a reading.
///
/// Duplicate names inside one reading are allowed and kept in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Parameter {
    /// Measurement name, e.g. `temp`.
    pub name: String,
    /// Measured value. Always finite once validated.
    pub value: f64,
    /// Measurement units, e.g. `C`.
    pub units: String,
}

impl Parameter {
    /// Build a parameter from its three parts.
    pub fn new(name: impl Into<String>, value: f64, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            units: units.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// NewReading
// ---------------------------------------------------------------------------

/// A validated reading that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    /// Identifier of the sensor that produced the reading.
    pub sensor_id: String,
    /// Measurements, in submission order. Never empty.
    pub params: Vec<Parameter>,
    /// Client-supplied timestamp. The store assigns "now" when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewReading {
    /// Build a reading that will be stamped by the store at insert time.
    pub fn new(sensor_id: impl Into<String>, params: Vec<Parameter>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            params,
            timestamp: None,
        }
    }

    /// Attach an explicit timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

// ---------------------------------------------------------------------------
// StoredReading
// ---------------------------------------------------------------------------

/// A persisted reading as returned by the telemetry store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StoredReading {
    /// Store-assigned unique id.
    pub id: ReadingId,
    /// Identifier of the sensor that produced the reading.
    pub sensor_id: String,
    /// Measurements, in submission order.
    pub params: Vec<Parameter>,
    /// When the reading was taken (or admitted, if the client sent none).
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stored_reading_wire_shape() {
        let reading = StoredReading {
            id: ReadingId::new(),
            sensor_id: String::from("s1"),
            params: vec![
                Parameter::new("temp", 21.5, "C"),
                Parameter::new("temp", 21.7, "C"),
            ],
            timestamp: "2024-05-01T10:00:00Z".parse().unwrap(),
        };

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["sensor_id"], "s1");
        assert_eq!(json["params"][1]["units"], "C");
        assert_eq!(json["params"].as_array().unwrap().len(), 2);
        assert_eq!(json["timestamp"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn new_reading_defaults_to_store_timestamp() {
        let reading = NewReading::new("s1", vec![Parameter::new("rh", 40.0, "%")]);
        assert!(reading.timestamp.is_none());

        let at: DateTime<Utc> = "2024-05-01T10:00:00Z".parse().unwrap();
        let reading = reading.with_timestamp(at);
        assert_eq!(reading.timestamp, Some(at));
    }
}
