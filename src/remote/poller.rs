//! Job polling.
//!
//! A poll loop is owned by the task applying one application. It sleeps
//! between polls, gives up at its deadline, and wakes early on cancellation.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::TransportError;

use super::client::RemoteClient;
use super::retry::RetryPolicy;
use super::types::{JobHandle, JobState};

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job succeeded, with the resource it produced.
    Succeeded(Option<String>),
    /// The job failed.
    Failed(String),
    /// The deadline passed before a terminal state.
    TimedOut,
    /// Cancellation was requested while waiting.
    Cancelled,
}

/// Polls job handles until they settle.
pub struct JobPoller<'a> {
    /// Control plane client.
    client: &'a dyn RemoteClient,
    /// Pause between polls.
    interval: Duration,
    /// Retry policy for each poll.
    retry: RetryPolicy,
    /// Cancellation signal.
    cancel: CancellationToken,
}

impl<'a> JobPoller<'a> {
    /// Creates a poller.
    #[must_use]
    pub const fn new(
        client: &'a dyn RemoteClient,
        interval: Duration,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            interval,
            retry,
            cancel,
        }
    }

    /// Polls `handle` until it is terminal, the deadline passes, or the push is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the transport error if a poll still fails after retries.
    pub async fn wait(
        &self,
        handle: &JobHandle,
        timeout: Duration,
    ) -> Result<PollOutcome, TransportError> {
        // An unrepresentable deadline means the job is polled until terminal.
        let deadline = Instant::now().checked_add(timeout);
        info!("Waiting for {} {} (timeout {}s)", handle.kind, handle.id, timeout.as_secs());

        loop {
            let state = self
                .retry
                .run("poll job", || self.client.poll_job(handle))
                .await?;

            match state {
                JobState::Succeeded { resource } => {
                    debug!("{} {} succeeded", handle.kind, handle.id);
                    return Ok(PollOutcome::Succeeded(resource));
                }
                JobState::Failed { reason } => {
                    debug!("{} {} failed: {reason}", handle.kind, handle.id);
                    return Ok(PollOutcome::Failed(reason));
                }
                JobState::Running => {}
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(PollOutcome::TimedOut);
                    }
                    self.interval.min(deadline - now)
                }
                None => self.interval,
            };
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                () = tokio::time::sleep(pause) => {}
            }
        }
    }
}
