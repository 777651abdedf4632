//! Transport client for transmitter endpoints.
//!
//! Each method performs one exchange and returns decoded JSON or an error;
//! status-code policy lives here, lifecycle policy lives in the receiver.

use crate::stream::POLL_DELIVERY_METHOD;
use crate::{SsfError, SsfResult, StreamStatus};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Path of the transmitter configuration metadata document.
pub const TRANSMITTER_CONFIG_PATH: &str = "/.well-known/ssf-configuration";

/// Transmitter configuration metadata.
///
/// Optional members default to empty when the transmitter omits them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransmitterConfig {
    /// Issuer identifier
    #[serde(default)]
    pub issuer: String,
    /// Key discovery URL
    #[serde(default)]
    pub jwks_uri: Option<String>,
    /// Supported delivery method URNs
    #[serde(default)]
    pub delivery_methods_supported: Vec<String>,
    /// Stream configuration endpoint
    #[serde(default)]
    pub configuration_endpoint: Option<String>,
    /// Stream status endpoint
    #[serde(default)]
    pub status_endpoint: Option<String>,
    /// SSF version implemented by the transmitter
    #[serde(default)]
    pub spec_version: Option<String>,
    /// Authorization scheme descriptors
    #[serde(default)]
    pub authorization_schemes: Vec<Map<String, Value>>,
}

impl TransmitterConfig {
    /// Configuration endpoint, ignoring an empty string.
    #[must_use]
    pub fn configuration_endpoint(&self) -> Option<&str> {
        non_empty(self.configuration_endpoint.as_deref())
    }

    /// Status endpoint, ignoring an empty string.
    #[must_use]
    pub fn status_endpoint(&self) -> Option<&str> {
        non_empty(self.status_endpoint.as_deref())
    }

    /// Whether the transmitter advertises poll delivery.
    ///
    /// An empty list is treated as "not advertised", not as unsupported.
    #[must_use]
    pub fn supports_poll_delivery(&self) -> bool {
        self.delivery_methods_supported.is_empty()
            || self
                .delivery_methods_supported
                .iter()
                .any(|m| m == POLL_DELIVERY_METHOD)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

#[derive(Debug, Serialize)]
struct Delivery<'a> {
    method: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateStreamRequest<'a> {
    delivery: Delivery<'a>,
    events_requested: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// Stream creation response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CreatedStream {
    /// Transmitter-assigned stream identifier
    pub stream_id: String,
    /// Initial status, when the transmitter reports one
    #[serde(default)]
    pub status: Option<String>,
}

/// Poll request body (RFC 8936).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollRequest {
    /// JTIs of previously received SETs
    pub ack: Vec<String>,
    /// Maximum number of SETs to return
    #[serde(rename = "maxEvents")]
    pub max_events: u32,
    /// Return immediately instead of long-polling
    #[serde(rename = "returnImmediately")]
    pub return_immediately: bool,
}

/// Poll response body (RFC 8936).
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PollResponse {
    /// Raw SETs keyed by JTI
    #[serde(default)]
    pub sets: BTreeMap<String, String>,
    /// More SETs are waiting at the transmitter
    #[serde(rename = "moreAvailable", default)]
    pub more_available: bool,
}

#[derive(Debug, Serialize)]
struct UpdateStatusRequest<'a> {
    stream_id: &'a str,
    status: StreamStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

/// HTTP client for transmitter exchanges.
#[derive(Debug, Clone)]
pub struct TransmitterClient {
    http: Client,
}

impl TransmitterClient {
    /// Wrap a configured HTTP client.
    #[must_use]
    pub const fn new(http: Client) -> Self {
        Self { http }
    }

    /// Fetch transmitter configuration metadata.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint is unreachable, answers with a non-success
    /// status, or returns a body that is not a configuration document.
    #[instrument(skip(self))]
    pub async fn fetch_transmitter_config(&self, url: &str) -> SsfResult<TransmitterConfig> {
        let response = self.http.get(url).send().await?;
        let response = expect_success(response, url)?;
        read_json(response).await
    }

    /// Create a poll-delivery stream for `events_requested`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, a non-success status, or a response
    /// without a non-empty `stream_id`.
    #[instrument(skip(self, credential))]
    pub async fn create_stream(
        &self,
        configuration_endpoint: &str,
        credential: &SecretString,
        events_requested: &[String],
        description: Option<&str>,
    ) -> SsfResult<CreatedStream> {
        let body = CreateStreamRequest {
            delivery: Delivery {
                method: POLL_DELIVERY_METHOD,
            },
            events_requested,
            description,
        };

        let response = authorized(self.http.post(configuration_endpoint), credential)
            .json(&body)
            .send()
            .await?;
        let response = expect_success(response, configuration_endpoint)?;
        let created: CreatedStream = read_json(response).await?;

        if created.stream_id.is_empty() {
            return Err(SsfError::registration("transmitter returned an empty stream_id"));
        }
        Ok(created)
    }

    /// Poll for SETs, acknowledging `request.ack`.
    ///
    /// # Errors
    ///
    /// Any status other than 200 or 202 is a protocol error. An empty body
    /// is an empty response; a non-JSON body is an error.
    #[instrument(skip(self, credential, request), fields(acks = request.ack.len()))]
    pub async fn poll(
        &self,
        poll_url: &str,
        credential: &SecretString,
        request: &PollRequest,
    ) -> SsfResult<PollResponse> {
        let response = authorized(self.http.post(poll_url), credential)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(SsfError::unexpected_status(poll_url, status.as_u16()));
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(PollResponse::default());
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Request a stream status change and return the status the
    /// transmitter reports back.
    ///
    /// The stream id goes in both the query string and the body.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, a non-success status, or an unparsable
    /// status string.
    #[instrument(skip(self, credential))]
    pub async fn update_status(
        &self,
        status_url: &str,
        credential: &SecretString,
        stream_id: &str,
        status: StreamStatus,
        reason: Option<&str>,
    ) -> SsfResult<StreamStatus> {
        let body = UpdateStatusRequest {
            stream_id,
            status,
            reason,
        };
        let response = authorized(self.http.post(status_url), credential)
            .query(&[("stream_id", stream_id)])
            .json(&body)
            .send()
            .await?;
        confirmed_status(expect_success(response, status_url)?).await
    }

    /// Read the current stream status.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, a non-success status, or an unparsable
    /// status string.
    #[instrument(skip(self, credential))]
    pub async fn read_status(
        &self,
        status_url: &str,
        credential: &SecretString,
        stream_id: &str,
    ) -> SsfResult<StreamStatus> {
        let response = authorized(self.http.get(status_url), credential)
            .query(&[("stream_id", stream_id)])
            .send()
            .await?;
        confirmed_status(expect_success(response, status_url)?).await
    }

    /// Delete a stream.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a non-success status.
    #[instrument(skip(self, credential))]
    pub async fn delete_stream(
        &self,
        configuration_endpoint: &str,
        credential: &SecretString,
        stream_id: &str,
    ) -> SsfResult<()> {
        let response = authorized(self.http.delete(configuration_endpoint), credential)
            .query(&[("stream_id", stream_id)])
            .send()
            .await?;
        expect_success(response, configuration_endpoint)?;
        Ok(())
    }
}

fn authorized(builder: RequestBuilder, credential: &SecretString) -> RequestBuilder {
    builder.bearer_auth(credential.expose_secret())
}

fn expect_success(response: Response, endpoint: &str) -> SsfResult<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(SsfError::unexpected_status(endpoint, response.status().as_u16()))
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> SsfResult<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn confirmed_status(response: Response) -> SsfResult<StreamStatus> {
    let body: StatusResponse = read_json(response).await?;
    if let Some(reason) = body.reason.as_deref().filter(|r| !r.is_empty()) {
        debug!(status = %body.status, reason, "Transmitter reported stream status");
    }
    body.status.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transmitter_config_defaults() {
        let config: TransmitterConfig =
            serde_json::from_value(json!({"configuration_endpoint": "https://t/cfg"})).unwrap();
        assert_eq!(config.configuration_endpoint(), Some("https://t/cfg"));
        assert_eq!(config.status_endpoint(), None);
        assert!(config.issuer.is_empty());
        assert!(config.supports_poll_delivery());
    }

    #[test]
    fn test_empty_endpoints_are_absent() {
        let config: TransmitterConfig = serde_json::from_value(json!({
            "issuer": "https://t",
            "configuration_endpoint": "",
            "status_endpoint": "",
            "delivery_methods_supported": ["urn:ietf:rfc:8935"]
        }))
        .unwrap();
        assert_eq!(config.configuration_endpoint(), None);
        assert_eq!(config.status_endpoint(), None);
        assert!(!config.supports_poll_delivery());
    }

    #[test]
    fn test_poll_request_wire_format() {
        let request = PollRequest {
            ack: vec!["a".to_string(), "b".to_string()],
            max_events: 10,
            return_immediately: true,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"ack": ["a", "b"], "maxEvents": 10, "returnImmediately": true})
        );
    }

    #[test]
    fn test_create_stream_wire_format() {
        let events = vec!["urn:e1".to_string()];
        let request = CreateStreamRequest {
            delivery: Delivery {
                method: POLL_DELIVERY_METHOD,
            },
            events_requested: &events,
            description: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"delivery": {"method": "urn:ietf:rfc:8936"}, "events_requested": ["urn:e1"]})
        );
    }

    #[test]
    fn test_update_status_wire_format() {
        let request = UpdateStatusRequest {
            stream_id: "s1",
            status: StreamStatus::Paused,
            reason: Some("maintenance"),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"stream_id": "s1", "status": "paused", "reason": "maintenance"})
        );
    }

    #[test]
    fn test_poll_response_parsing() {
        let response: PollResponse = serde_json::from_value(json!({
            "sets": {"jti-2": "b.b.", "jti-1": "a.a."},
            "moreAvailable": true
        }))
        .unwrap();
        assert_eq!(response.sets.keys().collect::<Vec<_>>(), vec!["jti-1", "jti-2"]);
        assert!(response.more_available);

        let empty: PollResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.sets.is_empty());
    }
}
