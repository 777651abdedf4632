//! Receiver error types using thiserror 2.0.
//!
//! [`SsfError`] covers every lifecycle operation. [`ParseError`] is the
//! narrower failure set of the event registry and parser, which never touch
//! the network.

use thiserror::Error;

/// Errors raised while turning a delivered SET into typed events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The token is not a `header.payload[.signature]` JWT with a JSON payload
    #[error("Malformed security event token: {0}")]
    MalformedToken(String),

    /// The claim set carries no `events` object
    #[error("Security event token has no events claim")]
    MissingEvents,

    /// The event-type URI is not in the registry
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Neither `sub_id` nor the fragment's `subject` yields a subject
    #[error("Event {0} has no subject identifier")]
    MissingSubject(String),

    /// The subject's `format` discriminator is not a known format
    #[error("Unknown subject format: {0}")]
    UnknownSubjectFormat(String),

    /// `event_timestamp` is absent or not numeric
    #[error("Event {0} has a missing or non-numeric event_timestamp")]
    InvalidTimestamp(String),

    /// A required event-specific claim is absent
    #[error("Event {event} is missing required field `{field}`")]
    MissingField {
        /// Event-type URI
        event: String,
        /// Canonical field name
        field: &'static str,
    },

    /// A claim is present but has the wrong JSON type
    #[error("Event {event} has an invalid `{field}` field")]
    InvalidField {
        /// Event-type URI
        event: String,
        /// Canonical field name
        field: &'static str,
    },

    /// A string enumerant is outside the known value set
    #[error("Unrecognized value `{value}` for `{field}`")]
    UnknownEnumerant {
        /// Canonical field name
        field: &'static str,
        /// Value found on the wire
        value: String,
    },
}

/// Receiver errors.
#[derive(Error, Debug)]
pub enum SsfError {
    /// Required configuration is missing or unusable
    #[error("Invalid receiver configuration: {0}")]
    InvalidConfig(String),

    /// Transmitter configuration metadata could not be fetched or used
    #[error("Transmitter discovery failed: {0}")]
    Discovery(String),

    /// Stream creation failed
    #[error("Stream registration failed: {0}")]
    Registration(String),

    /// The transmitter answered with a status code the exchange does not accept
    #[error("Transmitter returned HTTP {status} for {endpoint}")]
    UnexpectedStatus {
        /// Endpoint that was called
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// The transmitter did not advertise a status endpoint
    #[error("Transmitter does not support stream status")]
    StatusUnsupported,

    /// The transmitter echoed a status string outside enabled/paused/disabled
    #[error("Unrecognized stream status: {0}")]
    UnknownStatus(String),

    /// A poll scheduler is already running for this receiver
    #[error("Poll scheduler is already running")]
    SchedulerRunning,

    /// The poll scheduler task ended abnormally
    #[error("Poll scheduler failed: {0}")]
    Scheduler(String),

    /// SET or event parse failure
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SsfError {
    /// Check if this error is retryable.
    ///
    /// Timeouts, connection failures, rate limiting and server-side
    /// failures are transient; everything else is a protocol or
    /// configuration problem that repeats on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::UnexpectedStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a discovery error.
    #[must_use]
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a registration error.
    #[must_use]
    pub fn registration(msg: impl Into<String>) -> Self {
        Self::Registration(msg.into())
    }

    /// Create an unexpected status error.
    #[must_use]
    pub fn unexpected_status(endpoint: impl Into<String>, status: u16) -> Self {
        Self::UnexpectedStatus {
            endpoint: endpoint.into(),
            status,
        }
    }
}

/// Result type for receiver operations.
pub type SsfResult<T> = Result<T, SsfError>;
