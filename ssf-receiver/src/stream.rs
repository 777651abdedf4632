//! Stream state held by the receiver.

use crate::SsfError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delivery method URN for poll-based delivery (RFC 8936).
pub const POLL_DELIVERY_METHOD: &str = "urn:ietf:rfc:8936";

/// Stream status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Events are delivered
    Enabled,
    /// Events are held by the transmitter
    Paused,
    /// Events are dropped by the transmitter
    Disabled,
}

impl StreamStatus {
    /// Wire value of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Paused => "paused",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamStatus {
    type Err = SsfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(Self::Enabled),
            "paused" => Ok(Self::Paused),
            "disabled" => Ok(Self::Disabled),
            other => Err(SsfError::UnknownStatus(other.to_string())),
        }
    }
}

/// Snapshot of the receiver's registered stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stream {
    /// Transmitter-assigned identifier
    pub id: String,
    /// Requested event-type URIs
    pub events_requested: Vec<String>,
    /// Last status confirmed by the transmitter
    pub status: StreamStatus,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Time of the last confirmed status change
    pub updated_at: DateTime<Utc>,
}

impl Stream {
    /// Record a newly registered stream.
    #[must_use]
    pub fn new(id: String, events_requested: Vec<String>, status: StreamStatus) -> Self {
        let now = Utc::now();
        Self {
            id,
            events_requested,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a transmitter-confirmed status.
    pub fn record_status(&mut self, status: StreamStatus) {
        if self.status != status {
            self.status = status;
            self.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("paused".parse::<StreamStatus>().unwrap(), StreamStatus::Paused);
        assert_eq!(StreamStatus::Disabled.to_string(), "disabled");

        let err = "suspended".parse::<StreamStatus>().unwrap_err();
        assert!(matches!(err, SsfError::UnknownStatus(s) if s == "suspended"));
    }

    #[test]
    fn test_record_status() {
        let mut stream = Stream::new("s1".to_string(), vec![], StreamStatus::Enabled);
        let created = stream.updated_at;

        stream.record_status(StreamStatus::Enabled);
        assert_eq!(stream.updated_at, created);

        stream.record_status(StreamStatus::Paused);
        assert_eq!(stream.status, StreamStatus::Paused);
        assert!(stream.updated_at >= created);
    }
}
