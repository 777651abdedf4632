//! Background poll scheduler.
//!
//! One spawned task per receiver drives the poll exchange on a fixed
//! interval and hands each batch to an [`EventSink`]. Cancellation goes
//! through a watch channel, so stopping is safe whether or not the loop is
//! still alive, and the task's outcome is recovered by awaiting its handle.

use crate::receiver::ReceiverCore;
use crate::retry::RetryPolicy;
use crate::{SsfError, SsfEvent, SsfResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Consumer of polled event batches.
///
/// Called synchronously on the scheduler task after every successful poll,
/// including polls that returned no events. A slow sink delays the next
/// poll.
pub trait EventSink: Send + Sync {
    /// Handle one batch of events.
    fn deliver(&self, events: Vec<SsfEvent>);
}

impl<F> EventSink for F
where
    F: Fn(Vec<SsfEvent>) + Send + Sync,
{
    fn deliver(&self, events: Vec<SsfEvent>) {
        self(events);
    }
}

/// What the background loop does when a poll fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PollFailurePolicy {
    /// Any poll error ends the loop.
    #[default]
    Stop,
    /// Retry transient errors with backoff; other errors end the loop.
    Retry(RetryPolicy),
}

#[derive(Debug)]
pub(crate) struct PollScheduler {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<SsfResult<()>>,
}

impl PollScheduler {
    pub(crate) fn start(
        core: Arc<ReceiverCore>,
        interval: Duration,
        sink: Arc<dyn EventSink>,
        policy: PollFailurePolicy,
    ) -> Self {
        let (cancel, cancelled) = watch::channel(false);
        info!(interval_secs = interval.as_secs_f64(), "Starting poll scheduler");
        let handle = tokio::spawn(run(core, interval, sink, policy, cancelled));
        Self { cancel, handle }
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the loop to stop and wait for it.
    ///
    /// Returns the error that ended the loop, if it ended on its own.
    pub(crate) async fn stop(self) -> SsfResult<()> {
        // Fails only if the loop already exited and dropped its receiver.
        let _ = self.cancel.send(true);
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(SsfError::Scheduler(e.to_string())),
        }
    }
}

async fn run(
    core: Arc<ReceiverCore>,
    interval: Duration,
    sink: Arc<dyn EventSink>,
    policy: PollFailurePolicy,
    mut cancelled: watch::Receiver<bool>,
) -> SsfResult<()> {
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancelled.changed() => break,
            outcome = poll_once(&core, &policy) => outcome,
        };

        match outcome {
            Ok(events) => {
                debug!(events = events.len(), "Delivering events to sink");
                sink.deliver(events);
            }
            Err(e) => {
                error!(error = %e, "Poll failed, stopping scheduler");
                return Err(e);
            }
        }

        tokio::select! {
            biased;
            _ = cancelled.changed() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    info!("Poll scheduler stopped");
    Ok(())
}

async fn poll_once(core: &ReceiverCore, policy: &PollFailurePolicy) -> SsfResult<Vec<SsfEvent>> {
    match policy {
        PollFailurePolicy::Stop => core.poll_events().await,
        PollFailurePolicy::Retry(retry) => retry.retry_poll(|| core.poll_events()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_is_sink() {
        let seen = Mutex::new(0usize);
        let sink = |events: Vec<SsfEvent>| {
            *seen.lock().unwrap() += events.len();
        };
        sink.deliver(Vec::new());
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn test_default_failure_policy_stops() {
        assert_eq!(PollFailurePolicy::default(), PollFailurePolicy::Stop);
    }
}
