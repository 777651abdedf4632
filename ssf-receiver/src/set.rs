//! Security Event Token (SET) decoding per RFC 8417.
//!
//! Tokens are decoded without signature verification: the header is
//! inspected only to report the algorithm, and the payload segment is
//! base64url-decoded into a claim set. Issuer, audience and signature are
//! NOT checked, so this trust model is only suitable for transmitters
//! reached over an already-authenticated channel.

use crate::ParseError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};

/// A decoded Security Event Token.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityEventToken {
    algorithm: Option<String>,
    events: Map<String, Value>,
    claims: Map<String, Value>,
}

impl SecurityEventToken {
    /// Decode a compact-serialized SET without verifying its signature.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedToken`] if the token is not a
    /// two- or three-segment JWT with JSON header and payload, and
    /// [`ParseError::MissingEvents`] if the claim set has no `events` object.
    pub fn decode_unverified(raw: &str) -> Result<Self, ParseError> {
        let segments: Vec<&str> = raw.trim().split('.').collect();
        if !(2..=3).contains(&segments.len()) {
            return Err(ParseError::MalformedToken(format!(
                "expected 2 or 3 segments, found {}",
                segments.len()
            )));
        }

        let header = decode_segment(segments[0], "header")?;
        let claims = decode_segment(segments[1], "payload")?;

        let Some(Value::Object(events)) = claims.get("events") else {
            return Err(ParseError::MissingEvents);
        };

        Ok(Self {
            algorithm: header.get("alg").and_then(Value::as_str).map(str::to_string),
            events: events.clone(),
            claims,
        })
    }

    /// Signing algorithm named in the JOSE header (not verified).
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    /// JWT ID
    #[must_use]
    pub fn jti(&self) -> Option<&str> {
        self.claims.get("jti").and_then(Value::as_str)
    }

    /// Issuer
    #[must_use]
    pub fn iss(&self) -> Option<&str> {
        self.claims.get("iss").and_then(Value::as_str)
    }

    /// Issued-at timestamp
    #[must_use]
    pub fn iat(&self) -> Option<i64> {
        self.claims.get("iat").and_then(Value::as_i64)
    }

    /// Audience values; a single-string `aud` yields one entry.
    #[must_use]
    pub fn aud(&self) -> Vec<&str> {
        match self.claims.get("aud") {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Transaction identifier
    #[must_use]
    pub fn txn(&self) -> Option<&str> {
        self.claims.get("txn").and_then(Value::as_str)
    }

    /// Top-level subject identifier, if it is a JSON object.
    #[must_use]
    pub fn sub_id(&self) -> Option<&Map<String, Value>> {
        self.claims.get("sub_id").and_then(Value::as_object)
    }

    /// Events map (event URI -> event claims).
    #[must_use]
    pub const fn events(&self) -> &Map<String, Value> {
        &self.events
    }

    /// Get the number of events in this SET.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events().len()
    }

    /// Full claim set.
    #[must_use]
    pub const fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Map<String, Value>, ParseError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| ParseError::MalformedToken(format!("{name}: {e}")))?;

    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ParseError::MalformedToken(format!("{name} is not a JSON object"))),
        Err(e) => Err(ParseError::MalformedToken(format!("{name}: {e}"))),
    }
}
