//! Test fixtures: unsigned SETs and transmitter metadata documents.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value, json};

/// Session revoked event URI.
pub const SESSION_REVOKED_URI: &str =
    "https://schemas.openid.net/secevent/caep/event-type/session-revoked";
/// Credential change event URI.
pub const CREDENTIAL_CHANGE_URI: &str =
    "https://schemas.openid.net/secevent/caep/event-type/credential-change";
/// Device compliance change event URI.
pub const DEVICE_COMPLIANCE_URI: &str =
    "https://schemas.openid.net/secevent/caep/event-type/device-compliance-change";
/// Assurance level change event URI.
pub const ASSURANCE_LEVEL_CHANGE_URI: &str =
    "https://schemas.openid.net/secevent/caep/event-type/assurance-level-change";
/// Token claims change event URI.
pub const TOKEN_CLAIMS_CHANGE_URI: &str =
    "https://schemas.openid.net/secevent/caep/event-type/token-claims-change";
/// Verification event URI.
pub const VERIFICATION_URI: &str = "https://schemas.openid.net/secevent/ssf/event-type/verification";
/// Stream updated event URI.
pub const STREAM_UPDATED_URI: &str =
    "https://schemas.openid.net/secevent/caep/event-type/stream-updated";

/// Every registered event URI.
pub const EVENT_TYPE_URIS: [&str; 7] = [
    SESSION_REVOKED_URI,
    CREDENTIAL_CHANGE_URI,
    DEVICE_COMPLIANCE_URI,
    ASSURANCE_LEVEL_CHANGE_URI,
    TOKEN_CLAIMS_CHANGE_URI,
    VERIFICATION_URI,
    STREAM_UPDATED_URI,
];

/// Event URIs whose events carry a subject and timestamp.
pub const SUBJECT_BOUND_EVENT_URIS: [&str; 5] = [
    SESSION_REVOKED_URI,
    CREDENTIAL_CHANGE_URI,
    DEVICE_COMPLIANCE_URI,
    ASSURANCE_LEVEL_CHANGE_URI,
    TOKEN_CLAIMS_CHANGE_URI,
];

/// Base64url-encode a claim set as an unsigned (`alg: none`) token.
#[must_use]
pub fn encode_unsigned(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "none", "typ": "secevent+jwt"}).to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.")
}

/// An `email` subject identifier.
#[must_use]
pub fn email_subject(email: &str) -> Value {
    json!({"format": "email", "email": email})
}

/// An `iss_sub` subject identifier.
#[must_use]
pub fn iss_sub_subject(iss: &str, sub: &str) -> Value {
    json!({"format": "iss_sub", "iss": iss, "sub": sub})
}

/// Builder for unsigned Security Event Tokens.
#[derive(Debug, Clone)]
pub struct UnsignedSetBuilder {
    jti: String,
    iss: String,
    aud: String,
    iat: i64,
    sub_id: Option<Value>,
    events: Map<String, Value>,
}

impl Default for UnsignedSetBuilder {
    fn default() -> Self {
        Self {
            jti: uuid::Uuid::new_v4().to_string(),
            iss: "https://transmitter.example.com".to_string(),
            aud: "https://receiver.example.com".to_string(),
            iat: chrono::Utc::now().timestamp(),
            sub_id: None,
            events: Map::new(),
        }
    }
}

impl UnsignedSetBuilder {
    /// Start a SET with a random JTI and no events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the JTI.
    #[must_use]
    pub fn with_jti(mut self, jti: impl Into<String>) -> Self {
        self.jti = jti.into();
        self
    }

    /// Set the top-level `sub_id` claim.
    #[must_use]
    pub fn with_sub_id(mut self, sub_id: Value) -> Self {
        self.sub_id = Some(sub_id);
        self
    }

    /// Add an event fragment under `uri`.
    #[must_use]
    pub fn with_event(mut self, uri: impl Into<String>, fragment: Value) -> Self {
        self.events.insert(uri.into(), fragment);
        self
    }

    /// The JTI this SET will carry.
    #[must_use]
    pub fn jti(&self) -> &str {
        &self.jti
    }

    /// The claim set.
    #[must_use]
    pub fn claims(&self) -> Value {
        let mut claims = json!({
            "jti": self.jti,
            "iss": self.iss,
            "aud": self.aud,
            "iat": self.iat,
            "events": self.events,
        });
        if let (Some(sub_id), Some(map)) = (&self.sub_id, claims.as_object_mut()) {
            map.insert("sub_id".to_string(), sub_id.clone());
        }
        claims
    }

    /// Compact-serialized unsigned token.
    #[must_use]
    pub fn build(&self) -> String {
        encode_unsigned(&self.claims())
    }
}

/// Transmitter metadata rooted at `base`, with configuration and status
/// endpoints.
#[must_use]
pub fn transmitter_metadata(base: &str) -> Value {
    json!({
        "issuer": base,
        "jwks_uri": format!("{base}/jwks.json"),
        "delivery_methods_supported": ["urn:ietf:rfc:8936"],
        "configuration_endpoint": format!("{base}/ssf/stream"),
        "status_endpoint": format!("{base}/ssf/status"),
        "spec_version": "1_0-ID2",
        "authorization_schemes": [{"spec_urn": "urn:ietf:rfc:6749"}]
    })
}

/// Transmitter metadata without a status endpoint.
#[must_use]
pub fn transmitter_metadata_without_status(base: &str) -> Value {
    json!({
        "issuer": base,
        "configuration_endpoint": format!("{base}/ssf/stream"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_set_shape() {
        let builder = UnsignedSetBuilder::new()
            .with_jti("jti-1")
            .with_sub_id(email_subject("a@b.com"))
            .with_event(SESSION_REVOKED_URI, json!({"event_timestamp": 1}));
        let raw = builder.build();

        let segments: Vec<&str> = raw.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert!(segments[2].is_empty());

        let payload: Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments[1]).unwrap()).unwrap();
        assert_eq!(payload["jti"], "jti-1");
        assert_eq!(payload["sub_id"]["email"], "a@b.com");
        assert!(payload["events"][SESSION_REVOKED_URI].is_object());
    }

    #[test]
    fn test_metadata_endpoints() {
        let metadata = transmitter_metadata("http://127.0.0.1:9000");
        assert_eq!(metadata["configuration_endpoint"], "http://127.0.0.1:9000/ssf/stream");
        assert!(transmitter_metadata_without_status("http://t")["status_endpoint"].is_null());
    }
}
