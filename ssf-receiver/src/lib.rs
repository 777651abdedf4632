//! Shared Signals Framework (SSF) poll-delivery receiver.
//!
//! Registers a stream with an SSF transmitter, polls it for Security Event
//! Tokens (RFC 8936), and parses the CAEP and SSF events they carry into
//! typed values.
//!
//! # Features
//! - Transmitter discovery and stream registration
//! - Poll with ack-on-next-poll semantics
//! - Typed CAEP events with subject identifier resolution
//! - Stream status management and deletion
//! - Optional background polling into an event sink
//!
//! SETs are decoded without signature verification.

pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod parser;
pub mod receiver;
pub mod retry;
pub mod scheduler;
pub mod set;
pub mod stream;
pub mod subject;
pub mod transport;

pub use config::ReceiverConfig;
pub use error::{ParseError, SsfError, SsfResult};
pub use event::{
    AssuranceLevelChange, AssuranceNamespace, ChangeDirection, ChangeType, ComplianceStatus,
    CredentialChange, CredentialType, DeviceCompliance, EventContext, EventType,
    InitiatingEntity, LocalizedText, SessionRevoked, SsfEvent, StreamUpdated, TokenClaimsChange,
    Verification,
};
pub use http::HttpConfig;
pub use parser::{parse_event, parse_raw_set, parse_set};
pub use receiver::SsfReceiver;
pub use retry::{RetryConfig, RetryPolicy};
pub use scheduler::{EventSink, PollFailurePolicy};
pub use set::SecurityEventToken;
pub use stream::{Stream, StreamStatus};
pub use subject::{SubjectFormat, SubjectIdentifier};
pub use transport::TransmitterConfig;
