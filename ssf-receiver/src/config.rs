//! Receiver configuration.

use crate::http::HttpConfig;
use crate::scheduler::{EventSink, PollFailurePolicy};
use crate::transport::TRANSMITTER_CONFIG_PATH;
use crate::{EventType, SsfError, SsfResult};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default interval between background polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Default `maxEvents` sent with each poll.
pub const DEFAULT_MAX_EVENTS: u32 = 10;

/// Caller-supplied receiver configuration.
pub struct ReceiverConfig {
    /// Transmitter base URL, used to derive the discovery URL
    pub transmitter_url: String,
    /// Poll endpoint URL
    pub poll_url: String,
    /// Status endpoint; overrides the discovered one when set
    pub status_url: Option<String>,
    /// Event types to request
    pub events_requested: Vec<EventType>,
    /// Bearer credential for transmitter calls
    pub authorization_token: SecretString,
    /// Sink for background polling; starts the scheduler on configure
    pub sink: Option<Arc<dyn EventSink>>,
    /// Interval between background polls (default: 300s)
    pub poll_interval: Duration,
    /// Maximum SETs per poll (default: 10)
    pub max_events: u32,
    /// Ask the transmitter not to long-poll (default: true)
    pub return_immediately: bool,
    /// Stream description sent at registration
    pub description: Option<String>,
    /// HTTP client settings
    pub http: HttpConfig,
    /// What the background loop does when a poll fails (default: stop)
    pub failure_policy: PollFailurePolicy,
}

impl ReceiverConfig {
    /// Create a configuration with the required fields.
    #[must_use]
    pub fn new(
        transmitter_url: impl Into<String>,
        poll_url: impl Into<String>,
        events_requested: Vec<EventType>,
        authorization_token: impl Into<String>,
    ) -> Self {
        Self {
            transmitter_url: transmitter_url.into(),
            poll_url: poll_url.into(),
            status_url: None,
            events_requested,
            authorization_token: SecretString::from(authorization_token.into()),
            sink: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_events: DEFAULT_MAX_EVENTS,
            return_immediately: true,
            description: None,
            http: HttpConfig::default(),
            failure_policy: PollFailurePolicy::default(),
        }
    }

    /// Load configuration from `SSF_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`SsfError::InvalidConfig`] if a value cannot be parsed.
    /// Missing required values are reported by [`Self::validate`].
    pub fn from_env() -> SsfResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a key lookup function.
    ///
    /// Reads `SSF_TRANSMITTER_URL`, `SSF_POLL_URL`, `SSF_STATUS_URL`,
    /// `SSF_EVENTS` (comma-separated short names or URIs), `SSF_AUTH_TOKEN`
    /// and `SSF_POLL_INTERVAL_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`SsfError::InvalidConfig`] for an unknown event type or a
    /// non-numeric poll interval.
    pub fn from_lookup<F>(lookup: F) -> SsfResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let events = lookup("SSF_EVENTS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<EventType>()
                    .map_err(|e| SsfError::invalid_config(format!("SSF_EVENTS: {e}")))
            })
            .collect::<SsfResult<Vec<_>>>()?;

        let mut config = Self::new(
            lookup("SSF_TRANSMITTER_URL").unwrap_or_default(),
            lookup("SSF_POLL_URL").unwrap_or_default(),
            events,
            lookup("SSF_AUTH_TOKEN").unwrap_or_default(),
        );

        if let Some(status_url) = lookup("SSF_STATUS_URL") {
            config = config.with_status_url(status_url);
        }
        if let Some(secs) = lookup("SSF_POLL_INTERVAL_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                SsfError::invalid_config(format!("SSF_POLL_INTERVAL_SECS is not a number: {secs}"))
            })?;
            config.poll_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Set the status endpoint override. An empty URL clears it.
    #[must_use]
    pub fn with_status_url(mut self, status_url: impl Into<String>) -> Self {
        let status_url = status_url.into();
        self.status_url = (!status_url.trim().is_empty()).then_some(status_url);
        self
    }

    /// Set the sink that receives background poll batches.
    #[must_use]
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Set the background poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set `maxEvents`.
    #[must_use]
    pub const fn with_max_events(mut self, max_events: u32) -> Self {
        self.max_events = max_events;
        self
    }

    /// Set `returnImmediately`.
    #[must_use]
    pub const fn with_return_immediately(mut self, return_immediately: bool) -> Self {
        self.return_immediately = return_immediately;
        self
    }

    /// Set the stream description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set HTTP client settings.
    #[must_use]
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Set the background poll failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: PollFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Check required fields without touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`SsfError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> SsfResult<()> {
        if self.transmitter_url.trim().is_empty() {
            return Err(SsfError::invalid_config("transmitter_url is required"));
        }
        if self.poll_url.trim().is_empty() {
            return Err(SsfError::invalid_config("poll_url is required"));
        }
        if self.events_requested.is_empty() {
            return Err(SsfError::invalid_config(
                "at least one requested event type is required",
            ));
        }
        if self.authorization_token.expose_secret().trim().is_empty() {
            return Err(SsfError::invalid_config("authorization_token is required"));
        }
        if self.poll_interval.is_zero() {
            return Err(SsfError::invalid_config("poll_interval must be non-zero"));
        }
        self.discovery_url().map(|_| ())
    }

    /// Transmitter configuration metadata URL.
    ///
    /// Keeps the transmitter URL's scheme, host and port, inserts the
    /// well-known path, then appends the transmitter URL's path unless it
    /// is the root.
    ///
    /// # Errors
    ///
    /// Returns [`SsfError::InvalidConfig`] if the transmitter URL does not
    /// parse or has no host.
    pub fn discovery_url(&self) -> SsfResult<String> {
        let base = Url::parse(self.transmitter_url.trim()).map_err(|e| {
            SsfError::invalid_config(format!("transmitter_url is not a valid URL: {e}"))
        })?;
        let host = base
            .host_str()
            .ok_or_else(|| SsfError::invalid_config("transmitter_url has no host"))?;

        let mut url = format!("{}://{host}", base.scheme());
        if let Some(port) = base.port() {
            url.push_str(&format!(":{port}"));
        }
        url.push_str(TRANSMITTER_CONFIG_PATH);
        if base.path() != "/" {
            url.push_str(base.path());
        }
        Ok(url)
    }
}

impl fmt::Debug for ReceiverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverConfig")
            .field("transmitter_url", &self.transmitter_url)
            .field("poll_url", &self.poll_url)
            .field("status_url", &self.status_url)
            .field("events_requested", &self.events_requested)
            .field("authorization_token", &self.authorization_token)
            .field("sink", &self.sink.as_ref().map(|_| "EventSink"))
            .field("poll_interval", &self.poll_interval)
            .field("max_events", &self.max_events)
            .field("return_immediately", &self.return_immediately)
            .field("description", &self.description)
            .field("http", &self.http)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(transmitter_url: &str) -> ReceiverConfig {
        ReceiverConfig::new(
            transmitter_url,
            "https://t.example.com/poll",
            vec![EventType::SessionRevoked],
            "token",
        )
    }

    #[test]
    fn test_defaults() {
        let config = config("https://t.example.com");
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.max_events, 10);
        assert!(config.return_immediately);
        assert!(config.sink.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_required_fields() {
        assert!(matches!(config("").validate(), Err(SsfError::InvalidConfig(_))));

        let mut missing_poll = config("https://t.example.com");
        missing_poll.poll_url = String::new();
        assert!(matches!(missing_poll.validate(), Err(SsfError::InvalidConfig(_))));

        let mut missing_events = config("https://t.example.com");
        missing_events.events_requested.clear();
        assert!(matches!(missing_events.validate(), Err(SsfError::InvalidConfig(_))));

        let missing_token = ReceiverConfig::new(
            "https://t.example.com",
            "https://t.example.com/poll",
            vec![EventType::Verification],
            "  ",
        );
        assert!(matches!(missing_token.validate(), Err(SsfError::InvalidConfig(_))));

        let zero_interval = config("https://t.example.com").with_poll_interval(Duration::ZERO);
        assert!(matches!(zero_interval.validate(), Err(SsfError::InvalidConfig(_))));

        assert!(matches!(config("not a url").validate(), Err(SsfError::InvalidConfig(_))));
    }

    #[test]
    fn test_discovery_url() {
        assert_eq!(
            config("https://t.example.com").discovery_url().unwrap(),
            "https://t.example.com/.well-known/ssf-configuration"
        );
        assert_eq!(
            config("https://t.example.com/").discovery_url().unwrap(),
            "https://t.example.com/.well-known/ssf-configuration"
        );
        assert_eq!(
            config("https://t.example.com/tenants/acme").discovery_url().unwrap(),
            "https://t.example.com/.well-known/ssf-configuration/tenants/acme"
        );
        assert_eq!(
            config("http://127.0.0.1:8080").discovery_url().unwrap(),
            "http://127.0.0.1:8080/.well-known/ssf-configuration"
        );
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SSF_TRANSMITTER_URL", "https://t.example.com"),
            ("SSF_POLL_URL", "https://t.example.com/poll"),
            ("SSF_STATUS_URL", "https://t.example.com/status"),
            (
                "SSF_EVENTS",
                "session-revoked, https://schemas.openid.net/secevent/caep/event-type/credential-change,",
            ),
            ("SSF_AUTH_TOKEN", "secret"),
            ("SSF_POLL_INTERVAL_SECS", "60"),
        ]);

        let config =
            ReceiverConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();
        assert_eq!(
            config.events_requested,
            vec![EventType::SessionRevoked, EventType::CredentialChange]
        );
        assert_eq!(config.status_url.as_deref(), Some("https://t.example.com/status"));
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.authorization_token.expose_secret(), "secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let bad_event = ReceiverConfig::from_lookup(|key| {
            (key == "SSF_EVENTS").then(|| "session-revoked,bogus".to_string())
        });
        assert!(matches!(bad_event, Err(SsfError::InvalidConfig(_))));

        let bad_interval = ReceiverConfig::from_lookup(|key| {
            (key == "SSF_POLL_INTERVAL_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(bad_interval, Err(SsfError::InvalidConfig(_))));

        let empty = ReceiverConfig::from_lookup(|_| None).unwrap();
        assert!(matches!(empty.validate(), Err(SsfError::InvalidConfig(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", config("https://t.example.com"));
        assert!(!rendered.contains("\"token\""));
        assert!(rendered.contains("ReceiverConfig"));
    }
}
