//! SSF and CAEP event types and structures.
//!
//! Every event kind is a variant of the closed [`SsfEvent`] enum; callers
//! dispatch with `match` rather than downcasting.

use crate::{ParseError, SubjectFormat, SubjectIdentifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Event types understood by the receiver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    /// CAEP session revoked
    SessionRevoked,
    /// CAEP credential change
    CredentialChange,
    /// CAEP device compliance change
    DeviceCompliance,
    /// CAEP assurance level change
    AssuranceLevelChange,
    /// CAEP token claims change
    TokenClaimsChange,
    /// SSF stream verification
    Verification,
    /// SSF stream updated
    StreamUpdated,
}

impl EventType {
    /// Every registered event type.
    pub const ALL: [Self; 7] = [
        Self::SessionRevoked,
        Self::CredentialChange,
        Self::DeviceCompliance,
        Self::AssuranceLevelChange,
        Self::TokenClaimsChange,
        Self::Verification,
        Self::StreamUpdated,
    ];

    /// Get the canonical URI for this event type.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::SessionRevoked => {
                "https://schemas.openid.net/secevent/caep/event-type/session-revoked"
            }
            Self::CredentialChange => {
                "https://schemas.openid.net/secevent/caep/event-type/credential-change"
            }
            Self::DeviceCompliance => {
                "https://schemas.openid.net/secevent/caep/event-type/device-compliance-change"
            }
            Self::AssuranceLevelChange => {
                "https://schemas.openid.net/secevent/caep/event-type/assurance-level-change"
            }
            Self::TokenClaimsChange => {
                "https://schemas.openid.net/secevent/caep/event-type/token-claims-change"
            }
            Self::Verification => "https://schemas.openid.net/secevent/ssf/event-type/verification",
            Self::StreamUpdated => {
                "https://schemas.openid.net/secevent/caep/event-type/stream-updated"
            }
        }
    }

    /// Look up the event type registered for `uri`.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        URI_REGISTRY.get(uri).copied()
    }

    /// Last path segment of the URI, e.g. `session-revoked`.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        let uri = self.uri();
        uri.rsplit('/').next().unwrap_or(uri)
    }

    /// Whether events of this type describe a subject.
    ///
    /// Verification and stream-updated events are control-plane signals
    /// with no subject or timestamp.
    #[must_use]
    pub const fn is_subject_bound(self) -> bool {
        !matches!(self, Self::Verification | Self::StreamUpdated)
    }
}

static URI_REGISTRY: LazyLock<HashMap<&'static str, EventType>> =
    LazyLock::new(|| EventType::ALL.iter().map(|t| (t.uri(), *t)).collect());

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

impl FromStr for EventType {
    type Err = ParseError;

    /// Accepts a canonical URI or a short name such as `credential-change`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::from_uri(s)
            .or_else(|| Self::ALL.into_iter().find(|t| t.short_name() == s))
            .ok_or_else(|| ParseError::UnknownEventType(s.to_string()))
    }
}

/// Convert event types to the URIs sent in `events_requested`.
#[must_use]
pub fn event_type_uris(types: &[EventType]) -> Vec<String> {
    types.iter().map(|t| t.uri().to_string()).collect()
}

/// Who initiated a CAEP event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InitiatingEntity {
    /// An administrator
    Admin,
    /// The subject itself
    User,
    /// A policy evaluation
    Policy,
    /// Any other system action
    System,
}

/// Language-tagged text, e.g. `{"en": "Policy violation"}`.
pub type LocalizedText = BTreeMap<String, String>;

/// Attributes shared by every subject-bound event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventContext {
    /// Subject the event applies to
    pub subject: SubjectIdentifier,
    /// Unix timestamp of the event (seconds)
    pub event_timestamp: i64,
    /// Initiator of the event
    pub initiating_entity: Option<InitiatingEntity>,
    /// Admin-facing reason
    pub reason_admin: Option<LocalizedText>,
    /// User-facing reason
    pub reason_user: Option<LocalizedText>,
}

/// Session revoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRevoked {
    /// Common attributes
    pub context: EventContext,
    /// Claim set of the SET that carried the event
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set_claims: Map<String, Value>,
}

/// Credential type affected by a credential change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialType {
    /// `password`
    Password,
    /// `pin`
    Pin,
    /// `x509`
    X509,
    /// `fido2-platform`
    Fido2Platform,
    /// `fido2-roaming`
    Fido2Roaming,
    /// `fido-u2f`
    FidoU2f,
    /// `verifiable-credential`
    VerifiableCredential,
    /// `phone-voice`
    PhoneVoice,
    /// `phone-sms`
    PhoneSms,
    /// `app`
    App,
}

/// Kind of change applied to a credential.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// `create`
    Create,
    /// `revoke`
    Revoke,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

/// Credential change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialChange {
    /// Common attributes
    pub context: EventContext,
    /// Affected credential type
    pub credential_type: CredentialType,
    /// Applied change
    pub change_type: ChangeType,
    /// Credential display name
    pub friendly_name: Option<String>,
    /// Issuer of an X.509 credential
    pub x509_issuer: Option<String>,
    /// Serial number of an X.509 credential
    pub x509_serial: Option<String>,
    /// Authenticator AAGUID of a FIDO2 credential
    pub fido2_aaguid: Option<String>,
    /// Claim set of the SET that carried the event
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set_claims: Map<String, Value>,
}

/// Device compliance status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceStatus {
    /// `compliant`
    Compliant,
    /// `not-compliant`
    NotCompliant,
}

/// Device compliance change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceCompliance {
    /// Common attributes
    pub context: EventContext,
    /// Status before the change
    pub previous_status: ComplianceStatus,
    /// Status after the change
    pub current_status: ComplianceStatus,
    /// Claim set of the SET that carried the event
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set_claims: Map<String, Value>,
}

/// Namespace of assurance level values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AssuranceNamespace {
    /// `RFC8176`
    #[serde(rename = "RFC8176")]
    Rfc8176,
    /// `RFC6711`
    #[serde(rename = "RFC6711")]
    Rfc6711,
    /// `ISO-IEC-29115`
    #[serde(rename = "ISO-IEC-29115")]
    IsoIec29115,
    /// `NIST-IAL`
    #[serde(rename = "NIST-IAL")]
    NistIal,
    /// `NIST-AAL`
    #[serde(rename = "NIST-AAL")]
    NistAal,
    /// `NIST-FAL`
    #[serde(rename = "NIST-FAL")]
    NistFal,
}

/// Direction of an assurance level change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    /// `increase`
    Increase,
    /// `decrease`
    Decrease,
}

/// Assurance level change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssuranceLevelChange {
    /// Common attributes
    pub context: EventContext,
    /// Namespace of the level values
    pub namespace: AssuranceNamespace,
    /// Level after the change
    pub current_level: String,
    /// Level before the change
    pub previous_level: Option<String>,
    /// Whether assurance went up or down
    pub change_direction: Option<ChangeDirection>,
    /// Claim set of the SET that carried the event
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set_claims: Map<String, Value>,
}

/// Token claims change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaimsChange {
    /// Common attributes
    pub context: EventContext,
    /// Claims whose values changed, with their new values
    pub claims: Map<String, Value>,
    /// Claim set of the SET that carried the event
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set_claims: Map<String, Value>,
}

/// Stream verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verification {
    /// Opaque value echoed from the verification request
    pub state: String,
    /// Claim set of the SET that carried the event
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set_claims: Map<String, Value>,
}

/// Stream updated by the transmitter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamUpdated {
    /// New stream status
    pub status: crate::StreamStatus,
    /// Why the transmitter changed the status
    pub reason: Option<String>,
    /// Claim set of the SET that carried the event
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set_claims: Map<String, Value>,
}

/// A parsed security event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SsfEvent {
    /// Session revoked
    SessionRevoked(SessionRevoked),
    /// Credential change
    CredentialChange(CredentialChange),
    /// Device compliance change
    DeviceCompliance(DeviceCompliance),
    /// Assurance level change
    AssuranceLevelChange(AssuranceLevelChange),
    /// Token claims change
    TokenClaimsChange(TokenClaimsChange),
    /// Stream verification
    Verification(Verification),
    /// Stream updated
    StreamUpdated(StreamUpdated),
}

impl SsfEvent {
    /// Get the event type.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::SessionRevoked(_) => EventType::SessionRevoked,
            Self::CredentialChange(_) => EventType::CredentialChange,
            Self::DeviceCompliance(_) => EventType::DeviceCompliance,
            Self::AssuranceLevelChange(_) => EventType::AssuranceLevelChange,
            Self::TokenClaimsChange(_) => EventType::TokenClaimsChange,
            Self::Verification(_) => EventType::Verification,
            Self::StreamUpdated(_) => EventType::StreamUpdated,
        }
    }

    /// Get the event-type URI.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        self.event_type().uri()
    }

    /// Common attributes; `None` for control-plane events.
    #[must_use]
    pub const fn context(&self) -> Option<&EventContext> {
        match self {
            Self::SessionRevoked(e) => Some(&e.context),
            Self::CredentialChange(e) => Some(&e.context),
            Self::DeviceCompliance(e) => Some(&e.context),
            Self::AssuranceLevelChange(e) => Some(&e.context),
            Self::TokenClaimsChange(e) => Some(&e.context),
            Self::Verification(_) | Self::StreamUpdated(_) => None,
        }
    }

    /// Subject of the event.
    #[must_use]
    pub fn subject(&self) -> Option<&SubjectIdentifier> {
        self.context().map(|c| &c.subject)
    }

    /// Format of the event's subject.
    #[must_use]
    pub fn subject_format(&self) -> Option<SubjectFormat> {
        self.subject().map(|s| s.format)
    }

    /// Unix timestamp of the event.
    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        self.context().map(|c| c.event_timestamp)
    }

    /// Full claim set of the SET the event came from, including claims
    /// the typed fields do not cover (`iss`, `txn`, extensions).
    #[must_use]
    pub const fn set_claims(&self) -> &Map<String, Value> {
        match self {
            Self::SessionRevoked(e) => &e.set_claims,
            Self::CredentialChange(e) => &e.set_claims,
            Self::DeviceCompliance(e) => &e.set_claims,
            Self::AssuranceLevelChange(e) => &e.set_claims,
            Self::TokenClaimsChange(e) => &e.set_claims,
            Self::Verification(e) => &e.set_claims,
            Self::StreamUpdated(e) => &e.set_claims,
        }
    }

    /// Event timestamp as a UTC date-time.
    #[must_use]
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        self.timestamp()
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}
