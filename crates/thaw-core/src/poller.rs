//! Readiness polling.
//!
//! Each key runs its own state machine:
//!
//! ```text
//! Ongoing --(status not in progress)--> Ready
//!    |  ^
//!    |  +--(in progress: sleep next backoff step)
//!    +----(status query failed)--------> Failed
//! ```
//!
//! Checks for one key are strictly sequential. There is no retry limit: the
//! loop ends when the service stops reporting the recall as in progress, when
//! a status query fails, or when the caller's cancellation token fires.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backoff::{FibonacciBackoff, MAX_INTERVAL};
use crate::error::{Error, Result};
use crate::object::RestoreStatus;
use crate::store::ArchiveStore;

/// Poll state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollStatus {
    /// Recall still running; more checks follow.
    Ongoing,
    /// Recall finished; the object can be read.
    Ready,
    /// A status query failed.
    Failed,
}

impl PollStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ongoing => "ongoing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Progress of one key's poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    /// Key being polled.
    pub key: String,
    /// Current state.
    pub status: PollStatus,
    /// Status checks issued so far.
    pub checks: u32,
    /// Total time spent sleeping between checks.
    pub waited: Duration,
}

impl PollState {
    /// Starts a new poll in the `Ongoing` state.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: PollStatus::Ongoing,
            checks: 0,
            waited: Duration::ZERO,
        }
    }

    /// Records one successful status check.
    ///
    /// Moves to `Ready` once the recall is no longer in progress and returns
    /// the resulting status. A terminal state is never left.
    pub fn observe(&mut self, restore: &RestoreStatus) -> PollStatus {
        if !self.status.is_terminal() {
            self.checks += 1;
            if !restore.is_in_progress() {
                self.status = PollStatus::Ready;
            }
        }
        self.status
    }

    /// Records a failed status check.
    pub fn fail(&mut self) {
        if !self.status.is_terminal() {
            self.status = PollStatus::Failed;
        }
    }
}

/// Summary of a poll loop that reached `Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Key that became ready.
    pub key: String,
    /// Final state of the poll.
    pub status: PollStatus,
    /// Number of status checks issued, including the final one.
    pub checks: u32,
    /// Total time spent sleeping between checks.
    pub waited: Duration,
}

impl From<PollState> for PollReport {
    fn from(state: PollState) -> Self {
        Self {
            key: state.key,
            status: state.status,
            checks: state.checks,
            waited: state.waited,
        }
    }
}

/// Waits for recalls to complete by polling object status.
#[derive(Clone)]
pub struct ReadinessPoller {
    store: Arc<dyn ArchiveStore>,
    backoff: FibonacciBackoff,
}

impl ReadinessPoller {
    /// Creates a poller with the default one-second backoff unit.
    #[must_use]
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self {
            store,
            backoff: FibonacciBackoff::new(),
        }
    }

    /// Replaces the backoff schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: FibonacciBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Polls `key` until its recall is no longer in progress.
    ///
    /// An object with no recall status at all counts as ready. Passing a token
    /// that is never cancelled waits without bound.
    ///
    /// # Errors
    ///
    /// Returns the status query's error if one fails, or
    /// [`Error::Cancelled`] if `cancel` fires first.
    #[tracing::instrument(skip(self, cancel), fields(checks = tracing::field::Empty))]
    pub async fn wait_until_ready(
        &self,
        bucket: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<PollReport> {
        let mut state = PollState::new(key);
        let mut waits = self.backoff.clone().wait_intervals();
        let cap = self.backoff.unit().saturating_mul(u32::try_from(MAX_INTERVAL).unwrap_or(u32::MAX));

        tracing::info!(bucket, key, "watching");
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled { key: key.to_string() });
            }

            let status = match self.store.head_object(bucket, key).await {
                Ok(status) => status,
                Err(err) => {
                    state.fail();
                    tracing::warn!(
                        bucket,
                        key,
                        checks = state.checks,
                        status = %state.status,
                        error = %err,
                        "status check failed"
                    );
                    return Err(err);
                }
            };

            if state.observe(&status.restore).is_terminal() {
                tracing::Span::current().record("checks", state.checks);
                tracing::info!(
                    bucket,
                    key,
                    checks = state.checks,
                    waited_secs = state.waited.as_secs(),
                    "ready for download"
                );
                return Ok(state.into());
            }

            let wait = waits.next().unwrap_or(cap);
            tracing::debug!(
                bucket,
                key,
                attempt = state.checks,
                interval_secs = wait.as_secs(),
                "recall in progress"
            );
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(Error::Cancelled { key: key.to_string() });
                }
                () = tokio::time::sleep(wait) => {}
            }
            state.waited += wait;
        }
    }
}

impl fmt::Debug for ReadinessPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessPoller")
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
