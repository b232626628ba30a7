//! Recall request issuance.
//!
//! A recall request only asks the service to start rehydrating an archived
//! object; acceptance says nothing about completion. Requests are cheap, so a
//! batch issues them one after another.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};

use crate::error::{Error, Result};
use crate::fanout::{BatchResult, KeyOutcome};
use crate::inventory::Inventory;
use crate::object::KeySelector;
use crate::store::ArchiveStore;

/// Outcome of one recall request.
pub type RecallOutcome = KeyOutcome<()>;

/// Issues recall requests and aggregates their outcomes.
#[derive(Clone)]
pub struct RecallCoordinator {
    store: Arc<dyn ArchiveStore>,
}

impl RecallCoordinator {
    /// Creates a coordinator over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self { store }
    }

    /// Requests a recall of one object.
    ///
    /// # Errors
    ///
    /// Returns a communication error if the request is not accepted.
    pub async fn issue_recall(&self, bucket: &str, key: &str) -> Result<()> {
        match self.store.restore_object(bucket, key).await {
            Ok(()) => {
                tracing::info!(
                    bucket,
                    key,
                    requested_at = %Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                    "restore requested"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(bucket, key, error = %err, "restore request failed");
                Err(err)
            }
        }
    }

    /// Requests a recall and wraps the result as a per-key outcome.
    pub async fn recall_outcome(&self, bucket: &str, key: &str) -> RecallOutcome {
        RecallOutcome {
            key: key.to_string(),
            result: self.issue_recall(bucket, key).await,
        }
    }

    /// Requests a recall of every key, continuing past individual failures.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty key set, and
    /// [`Error::NoSuccess`] if no request was accepted.
    pub async fn issue_batch_recall(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<BatchResult<()>> {
        if keys.is_empty() {
            return Err(Error::configuration(format!(
                "no objects match bucket {bucket}"
            )));
        }

        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            outcomes.push(self.recall_outcome(bucket, key).await);
        }
        let batch = BatchResult::new(outcomes);
        tracing::info!(
            bucket,
            requested = batch.len(),
            accepted = batch.success_count(),
            "batch restore issued"
        );
        batch.into_policy_result("restore")
    }

    /// Recalls the key, or every object under the prefix.
    ///
    /// A single key propagates its error directly; a prefix applies the batch
    /// policy.
    ///
    /// # Errors
    ///
    /// See [`issue_recall`](Self::issue_recall) and
    /// [`issue_batch_recall`](Self::issue_batch_recall).
    pub async fn recall_selection(
        &self,
        bucket: &str,
        selector: &KeySelector,
    ) -> Result<BatchResult<()>> {
        match selector {
            KeySelector::Key(key) => {
                self.issue_recall(bucket, key).await?;
                Ok(BatchResult::new(vec![RecallOutcome {
                    key: key.clone(),
                    result: Ok(()),
                }]))
            }
            KeySelector::Prefix(_) => {
                let keys = Inventory::new(Arc::clone(&self.store))
                    .resolve_keys(bucket, selector)
                    .await?;
                self.issue_batch_recall(bucket, &keys).await
            }
        }
    }
}

impl std::fmt::Debug for RecallCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecallCoordinator").finish_non_exhaustive()
    }
}
