//! Stream lifecycle manager.
//!
//! [`SsfReceiver::configure`] discovers the transmitter and registers a
//! poll stream; the returned receiver is always active. Poll state lives in
//! a shared core so the background scheduler and direct callers go through
//! the same acknowledgment accumulator, one poll at a time.

use crate::config::ReceiverConfig;
use crate::event::event_type_uris;
use crate::http::build_http_client;
use crate::parser::parse_raw_set;
use crate::scheduler::{EventSink, PollFailurePolicy, PollScheduler};
use crate::transport::{PollRequest, TransmitterClient, TransmitterConfig};
use crate::{SsfError, SsfEvent, SsfResult, Stream, StreamStatus};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

/// Poll state shared with the background scheduler.
#[derive(Debug)]
pub(crate) struct ReceiverCore {
    client: TransmitterClient,
    token: SecretString,
    poll_url: String,
    max_events: u32,
    return_immediately: bool,
    /// JTIs received by the last successful poll, acknowledged on the next.
    /// Held for the whole exchange so concurrent pollers are serialized.
    acks: Mutex<Vec<String>>,
}

impl ReceiverCore {
    pub(crate) async fn poll_events(&self) -> SsfResult<Vec<SsfEvent>> {
        let mut acks = self.acks.lock().await;
        let request = PollRequest {
            ack: acks.clone(),
            max_events: self.max_events,
            return_immediately: self.return_immediately,
        };

        let response = self.client.poll(&self.poll_url, &self.token, &request).await?;

        // Replace before parsing: a SET that fails to parse is still acked.
        *acks = response.sets.keys().cloned().collect();
        drop(acks);

        info!(
            sets = response.sets.len(),
            acknowledged = request.ack.len(),
            more_available = response.more_available,
            "Polled transmitter"
        );

        let mut events = Vec::new();
        for (jti, raw) in &response.sets {
            let parsed = parse_raw_set(raw).inspect_err(|e| {
                warn!(jti = %jti, error = %e, "Failed to parse security event token");
            })?;
            events.extend(parsed);
        }
        Ok(events)
    }
}

/// A registered poll-delivery stream and the operations on it.
#[derive(Debug)]
pub struct SsfReceiver {
    core: Arc<ReceiverCore>,
    transmitter_config: TransmitterConfig,
    configuration_endpoint: String,
    status_url: Option<String>,
    stream: RwLock<Stream>,
    scheduler: Mutex<Option<PollScheduler>>,
    poll_interval: Duration,
    failure_policy: PollFailurePolicy,
}

impl SsfReceiver {
    /// Discover the transmitter, register a stream, and start background
    /// polling if the configuration carries a sink.
    ///
    /// # Errors
    ///
    /// - [`SsfError::InvalidConfig`] before any network call if a required
    ///   field is missing
    /// - [`SsfError::Discovery`] if metadata cannot be fetched or has no
    ///   configuration endpoint
    /// - [`SsfError::Registration`] if stream creation fails
    #[instrument(skip(config), fields(transmitter = %config.transmitter_url))]
    pub async fn configure(config: ReceiverConfig) -> SsfResult<Self> {
        config.validate()?;
        let discovery_url = config.discovery_url()?;

        let ReceiverConfig {
            poll_url,
            status_url,
            events_requested,
            authorization_token,
            sink,
            poll_interval,
            max_events,
            return_immediately,
            description,
            http,
            failure_policy,
            ..
        } = config;

        let client = TransmitterClient::new(build_http_client(&http)?);

        info!(url = %discovery_url, "Discovering transmitter configuration");
        let transmitter_config = client
            .fetch_transmitter_config(&discovery_url)
            .await
            .map_err(|e| SsfError::discovery(e.to_string()))?;

        let configuration_endpoint = transmitter_config
            .configuration_endpoint()
            .ok_or_else(|| SsfError::discovery("transmitter metadata has no configuration_endpoint"))?
            .to_string();
        if !transmitter_config.supports_poll_delivery() {
            warn!(
                methods = ?transmitter_config.delivery_methods_supported,
                "Transmitter does not advertise poll delivery"
            );
        }
        let status_url =
            status_url.or_else(|| transmitter_config.status_endpoint().map(str::to_string));

        let uris = event_type_uris(&events_requested);
        info!(endpoint = %configuration_endpoint, events = uris.len(), "Registering stream");
        let created = client
            .create_stream(
                &configuration_endpoint,
                &authorization_token,
                &uris,
                description.as_deref(),
            )
            .await
            .map_err(|e| match e {
                SsfError::Registration(_) => e,
                other => SsfError::registration(other.to_string()),
            })?;

        let status = match created.status.as_deref() {
            None => StreamStatus::Enabled,
            Some(raw) => raw.parse::<StreamStatus>().unwrap_or_else(|_| {
                warn!(status = raw, "Unrecognized initial stream status, assuming enabled");
                StreamStatus::Enabled
            }),
        };
        info!(stream_id = %created.stream_id, status = %status, "Stream active");

        let receiver = Self {
            core: Arc::new(ReceiverCore {
                client,
                token: authorization_token,
                poll_url,
                max_events,
                return_immediately,
                acks: Mutex::new(Vec::new()),
            }),
            transmitter_config,
            configuration_endpoint,
            status_url,
            stream: RwLock::new(Stream::new(created.stream_id, uris, status)),
            scheduler: Mutex::new(None),
            poll_interval,
            failure_policy,
        };

        if let Some(sink) = sink {
            receiver.spawn_scheduler(poll_interval, sink).await?;
        }
        Ok(receiver)
    }

    /// Poll once, acknowledging the SETs received by the previous poll.
    ///
    /// # Errors
    ///
    /// Transport errors leave the pending acknowledgments in place. A SET
    /// that fails to parse fails the whole call, but its JTI is still
    /// acknowledged on the next poll.
    #[instrument(skip(self))]
    pub async fn poll_events(&self) -> SsfResult<Vec<SsfEvent>> {
        self.core.poll_events().await
    }

    /// Ask the transmitter to enable the stream.
    ///
    /// # Errors
    ///
    /// See [`Self::update_stream_status`].
    pub async fn enable_stream(&self) -> SsfResult<StreamStatus> {
        self.update_stream_status(StreamStatus::Enabled, None).await
    }

    /// Ask the transmitter to pause the stream.
    ///
    /// # Errors
    ///
    /// See [`Self::update_stream_status`].
    pub async fn pause_stream(&self) -> SsfResult<StreamStatus> {
        self.update_stream_status(StreamStatus::Paused, None).await
    }

    /// Ask the transmitter to disable the stream.
    ///
    /// # Errors
    ///
    /// See [`Self::update_stream_status`].
    pub async fn disable_stream(&self) -> SsfResult<StreamStatus> {
        self.update_stream_status(StreamStatus::Disabled, None).await
    }

    /// Request a status change and return the status the transmitter
    /// confirms, which is also recorded on [`Self::stream`].
    ///
    /// # Errors
    ///
    /// [`SsfError::StatusUnsupported`] without a status endpoint (no
    /// request is made), otherwise transport or status-parse errors.
    #[instrument(skip(self))]
    pub async fn update_stream_status(
        &self,
        status: StreamStatus,
        reason: Option<&str>,
    ) -> SsfResult<StreamStatus> {
        let status_url = self.status_url()?;
        let stream_id = self.stream_id().await;

        let confirmed = self
            .core
            .client
            .update_status(status_url, &self.core.token, &stream_id, status, reason)
            .await?;
        if confirmed != status {
            warn!(requested = %status, confirmed = %confirmed, "Transmitter confirmed a different status");
        }

        self.stream.write().await.record_status(confirmed);
        info!(stream_id = %stream_id, status = %confirmed, "Stream status updated");
        Ok(confirmed)
    }

    /// Read the stream status from the transmitter.
    ///
    /// # Errors
    ///
    /// [`SsfError::StatusUnsupported`] without a status endpoint (no
    /// request is made), otherwise transport or status-parse errors.
    #[instrument(skip(self))]
    pub async fn get_stream_status(&self) -> SsfResult<StreamStatus> {
        let status_url = self.status_url()?;
        let stream_id = self.stream_id().await;

        let status = self
            .core
            .client
            .read_status(status_url, &self.core.token, &stream_id)
            .await?;
        self.stream.write().await.record_status(status);
        Ok(status)
    }

    /// Start background polling with `sink`.
    ///
    /// A loop that already ended on its own is replaced.
    ///
    /// # Errors
    ///
    /// [`SsfError::SchedulerRunning`] if a loop is live, or
    /// [`SsfError::InvalidConfig`] for a zero interval.
    pub async fn start_polling(
        &self,
        interval: Duration,
        sink: impl EventSink + 'static,
    ) -> SsfResult<()> {
        self.spawn_scheduler(interval, Arc::new(sink)).await
    }

    /// Start background polling at the configured interval.
    ///
    /// # Errors
    ///
    /// See [`Self::start_polling`].
    pub async fn start_polling_default(&self, sink: impl EventSink + 'static) -> SsfResult<()> {
        self.spawn_scheduler(self.poll_interval, Arc::new(sink)).await
    }

    /// Stop background polling. A no-op when nothing is running.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the loop if it had already stopped on
    /// its own.
    pub async fn stop_polling(&self) -> SsfResult<()> {
        let Some(scheduler) = self.scheduler.lock().await.take() else {
            return Ok(());
        };
        scheduler.stop().await
    }

    /// Whether a background loop is live.
    pub async fn is_polling(&self) -> bool {
        self.scheduler
            .lock()
            .await
            .as_ref()
            .is_some_and(PollScheduler::is_running)
    }

    /// Snapshot of the registered stream.
    pub async fn stream(&self) -> Stream {
        self.stream.read().await.clone()
    }

    /// Transmitter metadata fetched during discovery.
    #[must_use]
    pub const fn transmitter_config(&self) -> &TransmitterConfig {
        &self.transmitter_config
    }

    /// Effective status endpoint, if any.
    #[must_use]
    pub fn status_endpoint(&self) -> Option<&str> {
        self.status_url.as_deref()
    }

    /// Stop background polling and delete the stream at the transmitter.
    ///
    /// The scheduler's own outcome is logged, not returned.
    ///
    /// # Errors
    ///
    /// Transport errors from the delete request.
    #[instrument(skip(self))]
    pub async fn delete_receiver(self) -> SsfResult<()> {
        if let Some(scheduler) = self.scheduler.into_inner() {
            if let Err(e) = scheduler.stop().await {
                warn!(error = %e, "Poll scheduler ended with an error");
            }
        }

        let stream_id = self.stream.into_inner().id;
        self.core
            .client
            .delete_stream(&self.configuration_endpoint, &self.core.token, &stream_id)
            .await?;

        info!(stream_id = %stream_id, "Stream deleted");
        Ok(())
    }

    async fn spawn_scheduler(&self, interval: Duration, sink: Arc<dyn EventSink>) -> SsfResult<()> {
        if interval.is_zero() {
            return Err(SsfError::invalid_config("poll interval must be non-zero"));
        }

        let mut slot = self.scheduler.lock().await;
        if slot.as_ref().is_some_and(PollScheduler::is_running) {
            return Err(SsfError::SchedulerRunning);
        }
        if let Some(finished) = slot.take() {
            if let Err(e) = finished.stop().await {
                warn!(error = %e, "Previous poll scheduler ended with an error");
            }
        }

        *slot = Some(PollScheduler::start(
            Arc::clone(&self.core),
            interval,
            sink,
            self.failure_policy.clone(),
        ));
        Ok(())
    }

    fn status_url(&self) -> SsfResult<&str> {
        self.status_url.as_deref().ok_or(SsfError::StatusUnsupported)
    }

    async fn stream_id(&self) -> String {
        self.stream.read().await.id.clone()
    }
}
