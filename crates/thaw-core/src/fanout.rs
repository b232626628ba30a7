//! Bounded per-key fan-out.
//!
//! Runs one task per key with at most `limit` tasks in flight. New tasks are
//! spawned only when a slot frees up, so a large key set never turns into a
//! large pile of parked tasks.
//!
//! The manager always waits for every spawned task. A task's completion is
//! recorded whatever it returns, and a panicking task is recorded as a failure
//! for its key. A run over N keys therefore always yields N outcomes.
//!
//! Individual failures are logged and collected, never escalated. Callers
//! decide overall success with [`BatchResult::into_policy_result`], which
//! requires at least one success.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{Error, Result};
use crate::observability::key_span;

/// Default number of keys processed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Outcome of one key's sub-workflow.
#[derive(Debug)]
pub struct KeyOutcome<T> {
    /// Key the outcome belongs to.
    pub key: String,
    /// What the sub-workflow returned.
    pub result: Result<T>,
}

impl<T> KeyOutcome<T> {
    /// Returns true if the sub-workflow succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-key outcomes of a batch operation, in input order.
#[derive(Debug)]
pub struct BatchResult<T> {
    /// One outcome per input key.
    pub outcomes: Vec<KeyOutcome<T>>,
}

impl<T> BatchResult<T> {
    /// Wraps a list of outcomes.
    #[must_use]
    pub fn new(outcomes: Vec<KeyOutcome<T>>) -> Self {
        Self { outcomes }
    }

    /// Number of outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if the batch had no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns true if at least one key succeeded.
    #[must_use]
    pub fn overall_success(&self) -> bool {
        self.outcomes.iter().any(KeyOutcome::is_success)
    }

    /// Number of successful keys.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed keys.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    /// Successful keys with their values.
    pub fn successes(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|v| (o.key.as_str(), v)))
    }

    /// Failed keys with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.key.as_str(), e)))
    }

    /// Consumes the batch, keeping only the successful values.
    #[must_use]
    pub fn into_successes(self) -> Vec<T> {
        self.outcomes
            .into_iter()
            .filter_map(|o| o.result.ok())
            .collect()
    }

    /// Applies the batch policy: at least one key must have succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuccess`] when every key failed.
    pub fn into_policy_result(self, operation: &'static str) -> Result<Self> {
        if self.overall_success() {
            Ok(self)
        } else {
            Err(Error::NoSuccess {
                operation,
                attempted: self.len(),
            })
        }
    }
}

/// Bounded concurrent executor for per-key work.
#[derive(Debug, Clone)]
pub struct FanOut {
    limit: usize,
    cancel: CancellationToken,
    operation: &'static str,
    bucket: String,
}

impl Default for FanOut {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl FanOut {
    /// Creates a fan-out running at most `limit` tasks at once (minimum 1).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            cancel: CancellationToken::new(),
            operation: "batch",
            bucket: String::new(),
        }
    }

    /// Names the operation and bucket recorded on every task's span.
    #[must_use]
    pub fn labeled(mut self, operation: &'static str, bucket: impl Into<String>) -> Self {
        self.operation = operation;
        self.bucket = bucket.into();
        self
    }

    /// Stops spawning new tasks once `token` is cancelled.
    ///
    /// Tasks already running are still awaited; they see the same token
    /// through [`cancellation`](Self::cancellation).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Maximum tasks in flight.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Token checked before each spawn.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs `f` once per key and returns exactly one outcome per key.
    ///
    /// Keys left unspawned when cancellation fires are recorded as
    /// [`Error::Cancelled`].
    pub async fn run<I, F, Fut, T>(&self, keys: I, f: F) -> BatchResult<T>
    where
        I: IntoIterator<Item = String>,
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let keys: Vec<String> = keys.into_iter().collect();
        let f = Arc::new(f);
        let mut slots: Vec<Option<Result<T>>> = keys.iter().map(|_| None).collect();
        let mut pending = keys.iter().cloned().enumerate();
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < self.limit && !self.cancel.is_cancelled() {
                let Some((index, key)) = pending.next() else {
                    break;
                };
                let f = Arc::clone(&f);
                let span = key_span(self.operation, &self.bucket, &key);
                tasks.spawn(
                    async move {
                        let task_key = key.clone();
                        let result = AssertUnwindSafe(async move { (*f)(task_key).await })
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|payload| {
                                Err(Error::TaskPanicked {
                                    key,
                                    message: panic_message(payload.as_ref()),
                                })
                            });
                        (index, result)
                    }
                    .instrument(span),
                );
            }

            match tasks.join_next().await {
                Some(Ok((index, result))) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "fan-out task did not complete");
                }
                None => break,
            }
        }

        let cancelled = self.cancel.is_cancelled();
        let outcomes: Vec<KeyOutcome<T>> = keys
            .into_iter()
            .zip(slots)
            .map(|(key, slot)| {
                let result = slot.unwrap_or_else(|| {
                    if cancelled {
                        Err(Error::Cancelled { key: key.clone() })
                    } else {
                        Err(Error::TaskPanicked {
                            key: key.clone(),
                            message: "task aborted".to_string(),
                        })
                    }
                });
                KeyOutcome { key, result }
            })
            .collect();

        for outcome in &outcomes {
            if let Err(err) = &outcome.result {
                tracing::warn!(
                    op = self.operation,
                    bucket = %self.bucket,
                    key = %outcome.key,
                    error = %err,
                    "key failed"
                );
            }
        }

        let batch = BatchResult::new(outcomes);
        tracing::debug!(
            op = self.operation,
            bucket = %self.bucket,
            total = batch.len(),
            succeeded = batch.success_count(),
            failed = batch.failure_count(),
            cancelled,
            "fan-out complete"
        );
        batch
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
