//! Subject identifiers per the SSF subject identifier formats.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Subject identifier formats.
///
/// `ComplexSubject` is used when the payload carries no `format`
/// discriminator, i.e. a structured subject composed of several
/// identifiers keyed by role (`user`, `device`, `session`, ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubjectFormat {
    /// `account`
    Account,
    /// `email`
    Email,
    /// `iss_sub`
    #[serde(rename = "iss_sub")]
    IssuerAndSubject,
    /// `opaque`
    Opaque,
    /// `phone_number`
    PhoneNumber,
    /// `did`
    #[serde(rename = "did")]
    DecentralizedIdentifier,
    /// `uri`
    #[serde(rename = "uri")]
    UniqueResourceIdentifier,
    /// `aliases`
    Aliases,
    /// No discriminator present
    ComplexSubject,
}

impl SubjectFormat {
    /// Wire value of the `format` discriminator, if the format has one.
    #[must_use]
    pub const fn discriminator(self) -> Option<&'static str> {
        match self {
            Self::Account => Some("account"),
            Self::Email => Some("email"),
            Self::IssuerAndSubject => Some("iss_sub"),
            Self::Opaque => Some("opaque"),
            Self::PhoneNumber => Some("phone_number"),
            Self::DecentralizedIdentifier => Some("did"),
            Self::UniqueResourceIdentifier => Some("uri"),
            Self::Aliases => Some("aliases"),
            Self::ComplexSubject => None,
        }
    }

    /// Resolve a format from a `format` discriminator.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnknownSubjectFormat`] for unrecognized values.
    pub fn from_discriminator(value: &str) -> Result<Self, ParseError> {
        match value {
            "account" => Ok(Self::Account),
            "email" => Ok(Self::Email),
            "iss_sub" => Ok(Self::IssuerAndSubject),
            "opaque" => Ok(Self::Opaque),
            "phone_number" => Ok(Self::PhoneNumber),
            "did" => Ok(Self::DecentralizedIdentifier),
            "uri" => Ok(Self::UniqueResourceIdentifier),
            "aliases" => Ok(Self::Aliases),
            other => Err(ParseError::UnknownSubjectFormat(other.to_string())),
        }
    }
}

/// A subject reference: resolved format plus the raw key/value payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectIdentifier {
    /// Resolved format
    pub format: SubjectFormat,
    /// Payload exactly as delivered, including any `format` key
    pub payload: Map<String, Value>,
}

impl SubjectIdentifier {
    /// Build a subject from a delivered payload, resolving its format.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnknownSubjectFormat`] if the discriminator is
    /// present but unknown or not a string.
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self, ParseError> {
        let format = match payload.get("format") {
            None => SubjectFormat::ComplexSubject,
            Some(Value::String(s)) => SubjectFormat::from_discriminator(s)?,
            Some(other) => return Err(ParseError::UnknownSubjectFormat(other.to_string())),
        };
        Ok(Self { format, payload })
    }

    /// Get a string member of the payload (`email`, `sub`, `uri`, ...).
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_discriminator_round_trip() {
        let formats = [
            SubjectFormat::Account,
            SubjectFormat::Email,
            SubjectFormat::IssuerAndSubject,
            SubjectFormat::Opaque,
            SubjectFormat::PhoneNumber,
            SubjectFormat::DecentralizedIdentifier,
            SubjectFormat::UniqueResourceIdentifier,
            SubjectFormat::Aliases,
        ];
        for format in formats {
            let wire = format.discriminator().unwrap();
            assert_eq!(SubjectFormat::from_discriminator(wire).unwrap(), format);
        }
        assert!(SubjectFormat::ComplexSubject.discriminator().is_none());
    }

    #[test]
    fn test_missing_format_is_complex() {
        let subject = SubjectIdentifier::from_payload(object(json!({
            "user": {"format": "email", "email": "a@b.com"},
            "device": {"format": "opaque", "id": "d-1"}
        })))
        .unwrap();
        assert_eq!(subject.format, SubjectFormat::ComplexSubject);
    }

    #[test]
    fn test_unknown_format_is_error() {
        let err = SubjectIdentifier::from_payload(object(json!({"format": "saml"}))).unwrap_err();
        assert_eq!(err, ParseError::UnknownSubjectFormat("saml".to_string()));
    }

    #[test]
    fn test_get_str() {
        let subject =
            SubjectIdentifier::from_payload(object(json!({"format": "email", "email": "a@b.com"})))
                .unwrap();
        assert_eq!(subject.format, SubjectFormat::Email);
        assert_eq!(subject.get_str("email"), Some("a@b.com"));
        assert_eq!(subject.get_str("sub"), None);
    }
}
