//! Proptest generators for SET content.

use crate::fixtures::{EVENT_TYPE_URIS, SUBJECT_BOUND_EVENT_URIS};
use proptest::prelude::*;
use proptest::sample::select;
use serde_json::{Value, json};

/// Generate registered event-type URIs.
pub fn event_type_uri_strategy() -> impl Strategy<Value = &'static str> {
    select(EVENT_TYPE_URIS.to_vec())
}

/// Generate URIs of subject-bearing event types.
pub fn subject_bound_event_uri_strategy() -> impl Strategy<Value = &'static str> {
    select(SUBJECT_BOUND_EVENT_URIS.to_vec())
}

/// Generate event-type URIs that are not registered.
pub fn unknown_event_uri_strategy() -> impl Strategy<Value = String> {
    "[a-z]{4,12}".prop_map(|name| format!("https://events.example.com/event-type/{name}"))
}

/// Generate JTIs.
pub fn jti_strategy() -> impl Strategy<Value = String> {
    any::<u128>().prop_map(|bits| uuid::Uuid::from_u128(bits).to_string())
}

/// Generate event timestamps between 1970 and 2100.
pub fn event_timestamp_strategy() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800
}

/// Generate subject identifiers carrying a `format` discriminator.
///
/// Yields the discriminator alongside the payload.
pub fn formatted_subject_strategy() -> impl Strategy<Value = (&'static str, Value)> {
    prop_oneof![
        "[a-z0-9._]{1,20}@[a-z0-9-]{1,20}\\.[a-z]{2,4}"
            .prop_map(|email| ("email", json!({"format": "email", "email": email}))),
        ("[a-z]{3,12}", "[a-z0-9]{6,24}").prop_map(|(host, sub)| {
            (
                "iss_sub",
                json!({"format": "iss_sub", "iss": format!("https://{host}.example.com"), "sub": sub}),
            )
        }),
        "[a-z0-9]{8,32}".prop_map(|id| ("opaque", json!({"format": "opaque", "id": id}))),
        "\\+1[0-9]{10}".prop_map(|phone| {
            ("phone_number", json!({"format": "phone_number", "phone_number": phone}))
        }),
        "[a-z]{3,12}".prop_map(|name| {
            ("account", json!({"format": "account", "uri": format!("acct:{name}@example.com")}))
        }),
        "[a-z0-9]{8,20}".prop_map(|id| ("did", json!({"format": "did", "url": format!("did:example:{id}")}))),
        "[a-z]{3,12}".prop_map(|path| ("uri", json!({"format": "uri", "uri": format!("https://example.com/{path}")}))),
    ]
}

/// Generate structured subjects without a `format` discriminator.
pub fn complex_subject_strategy() -> impl Strategy<Value = Value> {
    ("[a-z0-9._]{1,20}@example\\.com", "[a-z0-9]{8,16}").prop_map(|(email, device)| {
        json!({
            "user": {"format": "email", "email": email},
            "device": {"format": "opaque", "id": device}
        })
    })
}

/// Generate `format` values that are not known subject formats.
pub fn unknown_subject_format_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,10}".prop_filter("known format", |f| {
        !matches!(
            f.as_str(),
            "account" | "email" | "iss_sub" | "opaque" | "did" | "uri" | "aliases"
        )
    })
}

/// Generate wire `credential_type` values.
pub fn credential_type_strategy() -> impl Strategy<Value = &'static str> {
    select(vec![
        "password",
        "pin",
        "x509",
        "fido2-platform",
        "fido2-roaming",
        "fido-u2f",
        "verifiable-credential",
        "phone-voice",
        "phone-sms",
        "app",
    ])
}

/// Generate wire `change_type` values.
pub fn change_type_strategy() -> impl Strategy<Value = &'static str> {
    select(vec!["create", "revoke", "update", "delete"])
}

/// Generate a valid claim fragment for a subject-bearing event URI.
pub fn event_fragment_strategy(
    uri: &'static str,
) -> impl Strategy<Value = Value> {
    (
        event_timestamp_strategy(),
        credential_type_strategy(),
        change_type_strategy(),
        any::<bool>(),
    )
        .prop_map(move |(ts, credential_type, change_type, flag)| {
            match uri {
                crate::fixtures::CREDENTIAL_CHANGE_URI => json!({
                    "event_timestamp": ts,
                    "credential_type": credential_type,
                    "change_type": change_type
                }),
                crate::fixtures::DEVICE_COMPLIANCE_URI => json!({
                    "event_timestamp": ts,
                    "previous_status": if flag { "compliant" } else { "not-compliant" },
                    "current_status": if flag { "not-compliant" } else { "compliant" }
                }),
                crate::fixtures::ASSURANCE_LEVEL_CHANGE_URI => json!({
                    "event_timestamp": ts,
                    "namespace": "NIST-AAL",
                    "current_level": if flag { "nist-aal2" } else { "nist-aal1" },
                    "change_direction": if flag { "increase" } else { "decrease" }
                }),
                crate::fixtures::TOKEN_CLAIMS_CHANGE_URI => json!({
                    "event_timestamp": ts,
                    "claims": {"role": if flag { "admin" } else { "user" }}
                }),
                _ => json!({"event_timestamp": ts}),
            }
        })
}
