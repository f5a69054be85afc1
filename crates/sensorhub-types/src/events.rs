//! Live event wire format.
//!
//! Every frame pushed to a live subscriber is one [`LiveEvent`], encoded as
//! JSON `{ "event": "<name>", "data": <payload> }`. Event names are the ones
//! existing dashboard clients already listen for.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::structs::StoredReading;

/// An event delivered to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export, export_to = "bindings/")]
pub enum LiveEvent {
    /// The most recent readings, sent once when a subscriber connects.
    #[serde(rename = "initial-data")]
    InitialData(Vec<StoredReading>),

    /// A reading was ingested and persisted.
    #[serde(rename = "new-data")]
    NewReading(StoredReading),

    /// Every stored reading was deleted.
    #[serde(rename = "delete-data")]
    AllDeleted,

    /// The connect-time snapshot could not be read.
    #[serde(rename = "error")]
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl LiveEvent {
    /// Wire name of this event.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InitialData(_) => "initial-data",
            Self::NewReading(_) => "new-data",
            Self::AllDeleted => "delete-data",
            Self::Error { .. } => "error",
        }
    }
}
