//! Data models for stored samples.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use eegstream_types::ChannelId;

/// A sample waiting to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    /// Channel the value belongs to.
    pub channel: ChannelId,
    /// Capture instant (UTC).
    pub timestamp: OffsetDateTime,
    /// Amplitude.
    pub value: f64,
}

impl NewSample {
    /// Create a new sample.
    pub fn new(channel: ChannelId, timestamp: OffsetDateTime, value: f64) -> Self {
        Self {
            channel,
            timestamp,
            value,
        }
    }
}

/// A sample stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSample {
    /// Database row ID, increasing across all channels.
    pub id: i64,
    /// Capture instant (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Channel identifier.
    pub channel: ChannelId,
    /// Amplitude.
    pub value: f64,
}
