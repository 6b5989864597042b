//! Poll pacing, budget and cancellation for waiting on a job.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{NeosError, NeosResult};
use crate::job::JobId;

/// How long and how often to poll a job.
///
/// The default matches the reference client: one second between polls and
/// no bound at all. Set `max_polls` or `timeout` to bound the wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause before each poll round trip.
    pub interval: Duration,
    /// Maximum number of poll iterations.
    pub max_polls: Option<u32>,
    /// Maximum wall-clock time spent waiting.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_polls: None,
            timeout: None,
        }
    }
}

impl PollConfig {
    /// Set the pause between polls.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Bound the number of poll iterations.
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Bound the total wait.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// True when neither a poll count nor a deadline is set.
    pub fn is_unbounded(&self) -> bool {
        self.max_polls.is_none() && self.timeout.is_none()
    }
}

/// Shared, awaitable flag that stops a poll loop.
///
/// A wait observes the flag while sleeping and while a request is in
/// flight, not only between iterations. Cancelling only stops local
/// polling; the job keeps running on the server.
#[derive(Debug, Clone)]
pub struct CancelFlag(Arc<watch::Sender<bool>>);

impl Default for CancelFlag {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self(Arc::new(tx))
    }
}

impl CancelFlag {
    /// A flag that is not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.0.subscribe();
        // `self` holds the sender, so the channel cannot close while waiting.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Book-keeping for one wait.
#[derive(Debug)]
pub(crate) struct PollBudget<'a> {
    config: &'a PollConfig,
    started: Instant,
    polls: u32,
}

impl<'a> PollBudget<'a> {
    pub(crate) fn start(config: &'a PollConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
            polls: 0,
        }
    }

    /// Account for the next iteration, or fail if the budget is spent.
    pub(crate) fn next_poll(&mut self, job: JobId, cancel: &CancelFlag) -> NeosResult<u32> {
        if cancel.is_cancelled() {
            return Err(NeosError::Cancelled { job });
        }
        if let Some(max) = self.config.max_polls {
            if self.polls >= max {
                return Err(NeosError::PollBudgetExhausted {
                    job,
                    polls: self.polls,
                });
            }
        }
        if let Some(timeout) = self.config.timeout {
            if self.started.elapsed() >= timeout {
                return Err(NeosError::Timeout { job });
            }
        }
        self.polls += 1;
        Ok(self.polls)
    }

    pub(crate) fn polls(&self) -> u32 {
        self.polls
    }

    /// Instant at which the wait times out, if bounded by time.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.config.timeout.map(|timeout| self.started + timeout)
    }

    /// Run one step of the wait, cut short by cancellation or the deadline.
    ///
    /// Cancellation wins over the deadline, and both win over a step that
    /// completes at the same instant.
    pub(crate) async fn guard<T>(
        &self,
        job: JobId,
        cancel: &CancelFlag,
        step: impl Future<Output = NeosResult<T>>,
    ) -> NeosResult<T> {
        let deadline = self.deadline();
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NeosError::Cancelled { job }),
            _ = expired => Err(NeosError::Timeout { job }),
            result = step => result,
        }
    }
}
