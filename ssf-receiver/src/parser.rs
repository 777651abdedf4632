//! Event registry and parser.
//!
//! Pure translation from an event-type URI and its claim fragment into a
//! typed [`SsfEvent`]. Nothing here performs I/O or keeps state, so parsing
//! the same SET twice always yields the same events.
//!
//! Parsing a SET is all-or-nothing: the first event that fails to parse
//! fails the whole token.

use crate::event::{
    AssuranceLevelChange, CredentialChange, DeviceCompliance, EventContext, LocalizedText,
    SessionRevoked, StreamUpdated, TokenClaimsChange, Verification,
};
use crate::{EventType, ParseError, SecurityEventToken, SsfEvent, SubjectIdentifier};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Event claims read by the parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimField {
    InitiatingEntity,
    ReasonAdmin,
    ReasonUser,
    CredentialType,
    ChangeType,
    FriendlyName,
    X509Issuer,
    X509Serial,
    Fido2Aaguid,
    PreviousStatus,
    CurrentStatus,
    Namespace,
    CurrentLevel,
    PreviousLevel,
    ChangeDirection,
    Claims,
    State,
    Status,
    Reason,
}

impl ClaimField {
    /// Accepted keys, canonical first.
    const fn keys(self) -> &'static [&'static str] {
        match self {
            Self::InitiatingEntity => &["initiating_entity"],
            Self::ReasonAdmin => &["reason_admin"],
            Self::ReasonUser => &["reason_user"],
            Self::CredentialType => &["credential_type"],
            Self::ChangeType => &["change_type"],
            Self::FriendlyName => &["friendly_name"],
            Self::X509Issuer => &["x509_issuer"],
            Self::X509Serial => &["x509_serial"],
            Self::Fido2Aaguid => &["fido2_aaguid"],
            Self::PreviousStatus => &["previousStatus", "previous_status"],
            Self::CurrentStatus => &["currentStatus", "current_status"],
            Self::Namespace => &["namespace"],
            Self::CurrentLevel => &["currentLevel", "current_level"],
            Self::PreviousLevel => &["previousLevel", "previous_level"],
            Self::ChangeDirection => &["changeDirection", "change_direction"],
            Self::Claims => &["claims"],
            Self::State => &["state"],
            Self::Status => &["status"],
            Self::Reason => &["reason"],
        }
    }

    const fn name(self) -> &'static str {
        self.keys()[0]
    }
}

/// Claim fragment of one event inside a SET.
struct Fragment<'a> {
    uri: &'a str,
    claims: &'a Map<String, Value>,
}

impl<'a> Fragment<'a> {
    fn lookup(&self, field: ClaimField) -> Option<&'a Value> {
        field
            .keys()
            .iter()
            .find_map(|key| self.claims.get(*key))
            .filter(|value| !value.is_null())
    }

    fn missing(&self, field: ClaimField) -> ParseError {
        ParseError::MissingField {
            event: self.uri.to_string(),
            field: field.name(),
        }
    }

    fn invalid(&self, field: ClaimField) -> ParseError {
        ParseError::InvalidField {
            event: self.uri.to_string(),
            field: field.name(),
        }
    }

    fn optional_str(&self, field: ClaimField) -> Result<Option<&'a str>, ParseError> {
        match self.lookup(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(self.invalid(field)),
        }
    }

    fn required_str(&self, field: ClaimField) -> Result<&'a str, ParseError> {
        self.optional_str(field)?.ok_or_else(|| self.missing(field))
    }

    fn optional_string(&self, field: ClaimField) -> Result<Option<String>, ParseError> {
        Ok(self.optional_str(field)?.map(str::to_string))
    }

    fn optional_enum<T: DeserializeOwned>(&self, field: ClaimField) -> Result<Option<T>, ParseError> {
        self.optional_str(field)?
            .map(|value| enumerant(field, value))
            .transpose()
    }

    fn required_enum<T: DeserializeOwned>(&self, field: ClaimField) -> Result<T, ParseError> {
        enumerant(field, self.required_str(field)?)
    }

    fn required_object(&self, field: ClaimField) -> Result<&'a Map<String, Value>, ParseError> {
        match self.lookup(field) {
            None => Err(self.missing(field)),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(self.invalid(field)),
        }
    }

    fn optional_text(&self, field: ClaimField) -> Result<Option<LocalizedText>, ParseError> {
        let Some(value) = self.lookup(field) else {
            return Ok(None);
        };
        let Value::Object(map) = value else {
            return Err(self.invalid(field));
        };
        map.iter()
            .map(|(lang, text)| {
                text.as_str()
                    .map(|t| (lang.clone(), t.to_string()))
                    .ok_or_else(|| self.invalid(field))
            })
            .collect::<Result<LocalizedText, _>>()
            .map(Some)
    }
}

fn enumerant<T: DeserializeOwned>(field: ClaimField, value: &str) -> Result<T, ParseError> {
    serde_json::from_value(Value::String(value.to_string())).map_err(|_| {
        ParseError::UnknownEnumerant {
            field: field.name(),
            value: value.to_string(),
        }
    })
}

/// Resolve the subject: a well-formed top-level `sub_id` wins over the
/// fragment's `subject`.
fn resolve_subject(
    fragment: &Fragment<'_>,
    claim_set: &Map<String, Value>,
) -> Result<SubjectIdentifier, ParseError> {
    let payload = match (claim_set.get("sub_id"), fragment.claims.get("subject")) {
        (Some(Value::Object(sub_id)), _) => sub_id,
        (_, Some(Value::Object(subject))) => subject,
        _ => return Err(ParseError::MissingSubject(fragment.uri.to_string())),
    };
    SubjectIdentifier::from_payload(payload.clone())
}

#[allow(clippy::cast_possible_truncation)]
fn resolve_timestamp(fragment: &Fragment<'_>) -> Result<i64, ParseError> {
    let value = fragment.claims.get("event_timestamp");
    value
        .and_then(Value::as_i64)
        .or_else(|| {
            value
                .and_then(Value::as_f64)
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        })
        .ok_or_else(|| ParseError::InvalidTimestamp(fragment.uri.to_string()))
}

fn resolve_context(
    fragment: &Fragment<'_>,
    claim_set: &Map<String, Value>,
) -> Result<EventContext, ParseError> {
    let subject = resolve_subject(fragment, claim_set)?;
    let event_timestamp = resolve_timestamp(fragment)?;

    Ok(EventContext {
        subject,
        event_timestamp,
        initiating_entity: fragment.optional_enum(ClaimField::InitiatingEntity)?,
        reason_admin: fragment.optional_text(ClaimField::ReasonAdmin)?,
        reason_user: fragment.optional_text(ClaimField::ReasonUser)?,
    })
}

/// Parse one event of a SET.
///
/// `fragment` is the value stored under `uri` in the SET's `events` claim;
/// `claim_set` is the full claim set, consulted for a top-level `sub_id`
/// and attached to the returned event.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first problem found: unknown
/// event type, missing subject, unknown subject format, missing or
/// non-numeric timestamp, or a missing/invalid event-specific field.
pub fn parse_event(
    uri: &str,
    fragment: &Value,
    claim_set: &Map<String, Value>,
) -> Result<SsfEvent, ParseError> {
    let event_type =
        EventType::from_uri(uri).ok_or_else(|| ParseError::UnknownEventType(uri.to_string()))?;

    let Value::Object(claims) = fragment else {
        return Err(ParseError::MalformedToken(format!(
            "event {uri} is not a JSON object"
        )));
    };
    let fragment = Fragment { uri, claims };

    let event = match event_type {
        EventType::Verification => SsfEvent::Verification(Verification {
            state: fragment.required_str(ClaimField::State)?.to_string(),
            set_claims: claim_set.clone(),
        }),
        EventType::StreamUpdated => SsfEvent::StreamUpdated(StreamUpdated {
            status: fragment.required_enum(ClaimField::Status)?,
            reason: fragment.optional_string(ClaimField::Reason)?,
            set_claims: claim_set.clone(),
        }),
        EventType::SessionRevoked => SsfEvent::SessionRevoked(SessionRevoked {
            context: resolve_context(&fragment, claim_set)?,
            set_claims: claim_set.clone(),
        }),
        EventType::CredentialChange => SsfEvent::CredentialChange(CredentialChange {
            context: resolve_context(&fragment, claim_set)?,
            credential_type: fragment.required_enum(ClaimField::CredentialType)?,
            change_type: fragment.required_enum(ClaimField::ChangeType)?,
            friendly_name: fragment.optional_string(ClaimField::FriendlyName)?,
            x509_issuer: fragment.optional_string(ClaimField::X509Issuer)?,
            x509_serial: fragment.optional_string(ClaimField::X509Serial)?,
            fido2_aaguid: fragment.optional_string(ClaimField::Fido2Aaguid)?,
            set_claims: claim_set.clone(),
        }),
        EventType::DeviceCompliance => SsfEvent::DeviceCompliance(DeviceCompliance {
            context: resolve_context(&fragment, claim_set)?,
            previous_status: fragment.required_enum(ClaimField::PreviousStatus)?,
            current_status: fragment.required_enum(ClaimField::CurrentStatus)?,
            set_claims: claim_set.clone(),
        }),
        EventType::AssuranceLevelChange => SsfEvent::AssuranceLevelChange(AssuranceLevelChange {
            context: resolve_context(&fragment, claim_set)?,
            namespace: fragment.required_enum(ClaimField::Namespace)?,
            current_level: fragment.required_str(ClaimField::CurrentLevel)?.to_string(),
            previous_level: fragment.optional_string(ClaimField::PreviousLevel)?,
            change_direction: fragment.optional_enum(ClaimField::ChangeDirection)?,
            set_claims: claim_set.clone(),
        }),
        EventType::TokenClaimsChange => SsfEvent::TokenClaimsChange(TokenClaimsChange {
            context: resolve_context(&fragment, claim_set)?,
            claims: fragment.required_object(ClaimField::Claims)?.clone(),
            set_claims: claim_set.clone(),
        }),
    };

    Ok(event)
}

/// Parse every event bundled in a SET, in event-URI order.
///
/// # Errors
///
/// Fails on the first event that does not parse; no partial result is
/// returned.
pub fn parse_set(set: &SecurityEventToken) -> Result<Vec<SsfEvent>, ParseError> {
    set.events()
        .iter()
        .map(|(uri, fragment)| parse_event(uri, fragment, set.claims()))
        .collect()
}

/// Decode a compact SET without verification and parse its events.
///
/// # Errors
///
/// Returns a [`ParseError`] if decoding or any event parse fails.
pub fn parse_raw_set(raw: &str) -> Result<Vec<SsfEvent>, ParseError> {
    parse_set(&SecurityEventToken::decode_unverified(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChangeType, ComplianceStatus, CredentialType, InitiatingEntity};
    use crate::{StreamStatus, SubjectFormat};
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    const SESSION_REVOKED_URI: &str =
        "https://schemas.openid.net/secevent/caep/event-type/session-revoked";
    const VERIFICATION_URI: &str = "https://schemas.openid.net/secevent/ssf/event-type/verification";

    fn unsigned(claims: &Value) -> String {
        let encode = |value: &Value| URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap());
        format!("{}.{}.", encode(&json!({"alg": "none"})), encode(claims))
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn email_subject() -> Value {
        json!({"format": "email", "email": "user@example.com"})
    }

    #[test]
    fn test_session_revoked_from_fragment_subject() {
        let fragment = json!({
            "subject": email_subject(),
            "event_timestamp": 1_700_000_000,
            "initiating_entity": "policy",
            "reason_admin": {"en": "Landspeed policy violation"}
        });
        let event =
            parse_event(EventType::SessionRevoked.uri(), &fragment, &Map::new()).unwrap();

        let SsfEvent::SessionRevoked(revoked) = &event else {
            panic!("expected session revoked, got {event:?}");
        };
        assert_eq!(revoked.context.subject.format, SubjectFormat::Email);
        assert_eq!(revoked.context.event_timestamp, 1_700_000_000);
        assert_eq!(revoked.context.initiating_entity, Some(InitiatingEntity::Policy));
        assert_eq!(
            revoked.context.reason_admin.as_ref().and_then(|r| r.get("en")).map(String::as_str),
            Some("Landspeed policy violation")
        );
    }

    #[test]
    fn test_sub_id_takes_precedence() {
        let claim_set = object(json!({
            "sub_id": {"format": "iss_sub", "iss": "https://idp", "sub": "u-1"}
        }));
        let fragment = json!({"subject": email_subject(), "event_timestamp": 1});
        let event = parse_event(EventType::SessionRevoked.uri(), &fragment, &claim_set).unwrap();

        let subject = event.subject().unwrap();
        assert_eq!(subject.format, SubjectFormat::IssuerAndSubject);
        assert_eq!(subject.get_str("sub"), Some("u-1"));
    }

    #[test]
    fn test_malformed_sub_id_falls_back_to_subject() {
        let claim_set = object(json!({"sub_id": "not-an-object"}));
        let fragment = json!({"subject": email_subject(), "event_timestamp": 1});
        let event = parse_event(EventType::SessionRevoked.uri(), &fragment, &claim_set).unwrap();
        assert_eq!(event.subject_format(), Some(SubjectFormat::Email));
    }

    #[test]
    fn test_missing_subject() {
        let fragment = json!({"event_timestamp": 1});
        let err =
            parse_event(EventType::SessionRevoked.uri(), &fragment, &Map::new()).unwrap_err();
        assert!(matches!(err, ParseError::MissingSubject(_)));
    }

    #[test]
    fn test_timestamp_required_for_subject_events() {
        let missing = json!({"subject": email_subject()});
        let err = parse_event(EventType::SessionRevoked.uri(), &missing, &Map::new()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestamp(_)));

        let textual = json!({"subject": email_subject(), "event_timestamp": "1700000000"});
        let err = parse_event(EventType::SessionRevoked.uri(), &textual, &Map::new()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_fractional_timestamp_is_truncated() {
        let fragment = json!({"subject": email_subject(), "event_timestamp": 1_700_000_000.75});
        let event = parse_event(EventType::SessionRevoked.uri(), &fragment, &Map::new()).unwrap();
        assert_eq!(event.timestamp(), Some(1_700_000_000));
    }

    #[test]
    fn test_credential_change() {
        let fragment = json!({
            "subject": email_subject(),
            "event_timestamp": 1,
            "credential_type": "fido2-roaming",
            "change_type": "revoke",
            "friendly_name": "YubiKey",
            "fido2_aaguid": "accced6a-63f5-490a-9eea-e59bc1896cfc"
        });
        let event =
            parse_event(EventType::CredentialChange.uri(), &fragment, &Map::new()).unwrap();

        let SsfEvent::CredentialChange(change) = event else {
            panic!("expected credential change");
        };
        assert_eq!(change.credential_type, CredentialType::Fido2Roaming);
        assert_eq!(change.change_type, ChangeType::Revoke);
        assert_eq!(change.friendly_name.as_deref(), Some("YubiKey"));
        assert!(change.x509_issuer.is_none());
    }

    #[test]
    fn test_unknown_enumerant() {
        let fragment = json!({
            "subject": email_subject(),
            "event_timestamp": 1,
            "credential_type": "retina",
            "change_type": "create"
        });
        let err =
            parse_event(EventType::CredentialChange.uri(), &fragment, &Map::new()).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownEnumerant {
                field: "credential_type",
                value: "retina".to_string()
            }
        );
    }

    #[test]
    fn test_missing_required_field() {
        let fragment = json!({
            "subject": email_subject(),
            "event_timestamp": 1,
            "credential_type": "password"
        });
        let err =
            parse_event(EventType::CredentialChange.uri(), &fragment, &Map::new()).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "change_type", .. }));
    }

    #[test]
    fn test_device_compliance_accepts_snake_case_alias() {
        let fragment = json!({
            "subject": email_subject(),
            "event_timestamp": 1,
            "previousStatus": "compliant",
            "current_status": "not-compliant"
        });
        let event =
            parse_event(EventType::DeviceCompliance.uri(), &fragment, &Map::new()).unwrap();

        let SsfEvent::DeviceCompliance(change) = event else {
            panic!("expected device compliance");
        };
        assert_eq!(change.previous_status, ComplianceStatus::Compliant);
        assert_eq!(change.current_status, ComplianceStatus::NotCompliant);
    }

    #[test]
    fn test_assurance_level_change() {
        let fragment = json!({
            "subject": email_subject(),
            "event_timestamp": 1,
            "namespace": "NIST-AAL",
            "current_level": "nist-aal2",
            "previous_level": "nist-aal1",
            "change_direction": "increase"
        });
        let event =
            parse_event(EventType::AssuranceLevelChange.uri(), &fragment, &Map::new()).unwrap();

        let SsfEvent::AssuranceLevelChange(change) = event else {
            panic!("expected assurance level change");
        };
        assert_eq!(change.current_level, "nist-aal2");
        assert_eq!(change.previous_level.as_deref(), Some("nist-aal1"));
        assert_eq!(change.change_direction, Some(crate::event::ChangeDirection::Increase));
    }

    #[test]
    fn test_token_claims_change_requires_object() {
        let fragment = json!({"subject": email_subject(), "event_timestamp": 1, "claims": "x"});
        let err =
            parse_event(EventType::TokenClaimsChange.uri(), &fragment, &Map::new()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidField { field: "claims", .. }));
    }

    #[test]
    fn test_control_plane_events_skip_subject() {
        let verification = parse_event(
            EventType::Verification.uri(),
            &json!({"state": "VGhpcyBpcyBhbiBleGFtcGxl"}),
            &Map::new(),
        )
        .unwrap();
        assert_eq!(
            verification,
            SsfEvent::Verification(Verification {
                state: "VGhpcyBpcyBhbiBleGFtcGxl".to_string(),
                set_claims: Map::new(),
            })
        );

        let updated =
            parse_event(EventType::StreamUpdated.uri(), &json!({"status": "paused"}), &Map::new())
                .unwrap();
        assert_eq!(
            updated,
            SsfEvent::StreamUpdated(StreamUpdated {
                status: StreamStatus::Paused,
                reason: None,
                set_claims: Map::new(),
            })
        );
    }

    #[test]
    fn test_events_carry_set_claims() {
        let raw = unsigned(&json!({
            "jti": "jti-1",
            "iss": "https://transmitter.example.com",
            "txn": "8675309",
            "x-tenant": "acme",
            "sub_id": {"format": "email", "email": "user@example.com"},
            "events": {
                SESSION_REVOKED_URI: {"event_timestamp": 1}
            }
        }));

        let events = parse_raw_set(&raw).unwrap();
        let claims = events[0].set_claims();
        assert_eq!(claims.get("iss"), Some(&json!("https://transmitter.example.com")));
        assert_eq!(claims.get("txn"), Some(&json!("8675309")));
        assert_eq!(claims.get("x-tenant"), Some(&json!("acme")));
        assert!(claims.contains_key("events"));
    }

    #[test]
    fn test_set_bundles_multiple_events() {
        let raw = unsigned(&json!({
            "jti": "jti-2",
            "sub_id": {"format": "email", "email": "user@example.com"},
            "events": {
                VERIFICATION_URI: {"state": "c3RhdGU"},
                SESSION_REVOKED_URI: {"event_timestamp": 1_700_000_000}
            }
        }));

        let events = parse_raw_set(&raw).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), EventType::SessionRevoked);
        assert_eq!(events[0].timestamp(), Some(1_700_000_000));
        let SsfEvent::Verification(verification) = &events[1] else {
            panic!("expected verification, got {:?}", events[1]);
        };
        assert_eq!(verification.state, "c3RhdGU");
        assert_eq!(events[0].set_claims(), events[1].set_claims());
    }

    #[test]
    fn test_one_bad_event_fails_whole_set() {
        let raw = unsigned(&json!({
            "jti": "jti-3",
            "sub_id": {"format": "email", "email": "user@example.com"},
            "events": {
                SESSION_REVOKED_URI: {"event_timestamp": 1_700_000_000},
                VERIFICATION_URI: {}
            }
        }));

        assert_eq!(
            parse_raw_set(&raw),
            Err(ParseError::MissingField {
                event: VERIFICATION_URI.to_string(),
                field: "state"
            })
        );
    }

    #[test]
    fn test_unknown_event_type() {
        let err = parse_event("https://example.com/event/other", &json!({}), &Map::new())
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownEventType("https://example.com/event/other".to_string())
        );
    }
}
