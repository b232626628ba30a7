//! Recall, wait, then fetch.
//!
//! The key set is resolved once and reused by every phase. A single key
//! propagates the first error it hits; a prefix applies the at-least-one
//! success policy to each phase, and only keys that became ready are fetched.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::backoff::FibonacciBackoff;
use crate::error::Result;
use crate::fanout::{BatchResult, FanOut, KeyOutcome};
use crate::inventory::Inventory;
use crate::object::KeySelector;
use crate::observability::recall_span;
use crate::poller::{PollReport, ReadinessPoller};
use crate::recall::RecallCoordinator;
use crate::retrieval::{FetchedArtifact, RetrievalManager};
use crate::store::ArchiveStore;

/// Knobs for one workflow run.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Fetch objects once they are ready.
    pub download: bool,
    /// Stops polling and spawning when cancelled.
    pub cancel: CancellationToken,
    /// Deadline for the wait phase, measured from when polling starts.
    /// Keys still polling when it passes report `Cancelled`; keys already
    /// ready are still fetched.
    pub wait_timeout: Option<Duration>,
    /// Concurrency for the wait and fetch phases.
    pub fan_out: FanOut,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            download: true,
            cancel: CancellationToken::new(),
            wait_timeout: None,
            fan_out: FanOut::default(),
        }
    }
}

/// Per-phase outcomes of a workflow run.
#[derive(Debug)]
pub struct WorkflowReport {
    /// Recall request outcomes.
    pub recalled: BatchResult<()>,
    /// Poll outcomes.
    pub ready: BatchResult<PollReport>,
    /// Fetch outcomes; `None` when downloading was not requested.
    pub fetched: Option<BatchResult<FetchedArtifact>>,
}

/// Runs the full recall workflow for a key or prefix.
#[derive(Debug, Clone)]
pub struct RecallWorkflow {
    inventory: Inventory,
    coordinator: RecallCoordinator,
    poller: ReadinessPoller,
    retrieval: RetrievalManager,
}

impl RecallWorkflow {
    /// Creates a workflow that downloads into `download_dir`.
    #[must_use]
    pub fn new(store: Arc<dyn ArchiveStore>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            inventory: Inventory::new(Arc::clone(&store)),
            coordinator: RecallCoordinator::new(Arc::clone(&store)),
            poller: ReadinessPoller::new(Arc::clone(&store)),
            retrieval: RetrievalManager::new(store, download_dir),
        }
    }

    /// Replaces the poll backoff schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: FibonacciBackoff) -> Self {
        self.poller = self.poller.with_backoff(backoff);
        self
    }

    /// Recalls the selection, waits for it, and optionally fetches it.
    ///
    /// # Errors
    ///
    /// For a single key, the first failing phase's error. For a prefix, a
    /// configuration error when nothing matches, or [`NoSuccess`] when a
    /// phase has no successful key.
    ///
    /// [`NoSuccess`]: crate::Error::NoSuccess
    pub async fn run(
        &self,
        bucket: &str,
        selector: &KeySelector,
        options: &WorkflowOptions,
    ) -> Result<WorkflowReport> {
        let span = recall_span("restore-and-wait-and-fetch", bucket);
        async {
            match selector {
                KeySelector::Key(key) => self.run_single(bucket, key, options).await,
                KeySelector::Prefix(_) => {
                    let keys = self.inventory.resolve_keys(bucket, selector).await?;
                    self.run_batch(bucket, keys, options).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_single(
        &self,
        bucket: &str,
        key: &str,
        options: &WorkflowOptions,
    ) -> Result<WorkflowReport> {
        self.coordinator.issue_recall(bucket, key).await?;
        let poll = {
            let wait = WaitScope::start(&options.cancel, options.wait_timeout);
            self.poller
                .wait_until_ready(bucket, key, wait.token())
                .await?
        };
        let fetched = if options.download {
            let artifact = self.retrieval.fetch(bucket, key).await?;
            Some(single(key, artifact))
        } else {
            None
        };
        Ok(WorkflowReport {
            recalled: single(key, ()),
            ready: single(key, poll),
            fetched,
        })
    }

    async fn run_batch(
        &self,
        bucket: &str,
        keys: Vec<String>,
        options: &WorkflowOptions,
    ) -> Result<WorkflowReport> {
        let fan_out = options
            .fan_out
            .clone()
            .with_cancellation(options.cancel.clone());

        let recalled = self.coordinator.issue_batch_recall(bucket, &keys).await?;

        let wait = WaitScope::start(&options.cancel, options.wait_timeout);
        let poller = self.poller.clone();
        let bucket_name = bucket.to_string();
        let cancel = wait.token().clone();
        let ready = fan_out
            .clone()
            .labeled("wait", bucket)
            .with_cancellation(wait.token().clone())
            .run(keys, move |key| {
                let poller = poller.clone();
                let bucket = bucket_name.clone();
                let cancel = cancel.clone();
                async move { poller.wait_until_ready(&bucket, &key, &cancel).await }
            })
            .await
            .into_policy_result("wait")?;
        drop(wait);

        let fetched = if options.download {
            let ready_keys: Vec<String> = ready.successes().map(|(k, _)| k.to_string()).collect();
            Some(self.retrieval.fetch_all(bucket, ready_keys, &fan_out).await?)
        } else {
            None
        };

        Ok(WorkflowReport {
            recalled,
            ready,
            fetched,
        })
    }
}

/// Cancellation for the wait phase only.
///
/// The token is a child of the run's token and is also cancelled when the
/// deadline passes. Dropping the scope stops the deadline timer.
struct WaitScope {
    token: CancellationToken,
    timer: Option<JoinHandle<()>>,
}

impl WaitScope {
    fn start(parent: &CancellationToken, deadline: Option<Duration>) -> Self {
        let token = parent.child_token();
        let timer = deadline.map(|limit| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::warn!(seconds = limit.as_secs(), "wait timeout reached, polling stopped");
                token.cancel();
            })
        });
        Self { token, timer }
    }

    fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for WaitScope {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

fn single<T>(key: &str, value: T) -> BatchResult<T> {
    BatchResult::new(vec![KeyOutcome {
        key: key.to_string(),
        result: Ok(value),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::StorageClass;
    use crate::store::MemoryStore;
    use crate::Error;

    fn archive(checks: u32) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new().with_restore_checks(checks));
        store
            .put_object("vault", "set/one.bin", vec![1u8; 4096], StorageClass::Archive)
            .unwrap();
        store
            .put_object("vault", "set/two.bin", vec![2u8; 10], StorageClass::Archive)
            .unwrap();
        store
    }

    #[tokio::test(start_paused = true)]
    async fn single_key_round_trip_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = RecallWorkflow::new(archive(3), dir.path());

        let report = workflow
            .run(
                "vault",
                &KeySelector::Key("set/one.bin".into()),
                &WorkflowOptions::default(),
            )
            .await
            .unwrap();

        let poll = report.ready.successes().next().unwrap().1;
        assert_eq!(poll.checks, 4);
        let fetched = report.fetched.unwrap();
        let artifact = fetched.successes().next().unwrap().1;
        assert_eq!(std::fs::read(&artifact.path).unwrap(), vec![1u8; 4096]);
    }

    #[tokio::test(start_paused = true)]
    async fn prefix_without_download_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = RecallWorkflow::new(archive(1), dir.path());
        let options = WorkflowOptions {
            download: false,
            ..WorkflowOptions::default()
        };

        let report = workflow
            .run("vault", &KeySelector::Prefix("set/".into()), &options)
            .await
            .unwrap();
        assert_eq!(report.recalled.success_count(), 2);
        assert_eq!(report.ready.success_count(), 2);
        assert!(report.fetched.is_none());
        assert!(!dir.path().join("one.bin").exists());
    }

    #[tokio::test]
    async fn empty_prefix_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = RecallWorkflow::new(archive(0), dir.path());
        let err = workflow
            .run(
                "vault",
                &KeySelector::Prefix("nothing/".into()),
                &WorkflowOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_batch_wait_has_no_ready_keys() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = RecallWorkflow::new(archive(10_000), dir.path());
        let options = WorkflowOptions::default();
        let cancel = options.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(600)).await;
            cancel.cancel();
        });

        let err = workflow
            .run("vault", &KeySelector::Prefix("set/".into()), &options)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no matching objects ready for restoration");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_deadline_still_fetches_ready_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = archive(10_000);
        store
            .put_object("vault", "set/warm.bin", vec![3u8; 8], StorageClass::Standard)
            .unwrap();
        let workflow = RecallWorkflow::new(store, dir.path());
        let options = WorkflowOptions {
            wait_timeout: Some(Duration::from_secs(600)),
            ..WorkflowOptions::default()
        };

        let report = workflow
            .run("vault", &KeySelector::Prefix("set/".into()), &options)
            .await
            .unwrap();

        assert_eq!(report.ready.success_count(), 1);
        assert!(!options.cancel.is_cancelled());
        let fetched = report.fetched.unwrap();
        assert_eq!(fetched.success_count(), 1);
        assert_eq!(std::fs::read(dir.path().join("warm.bin")).unwrap(), vec![3u8; 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_deadline_bounds_single_key() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = RecallWorkflow::new(archive(10_000), dir.path());
        let options = WorkflowOptions {
            wait_timeout: Some(Duration::from_secs(60)),
            ..WorkflowOptions::default()
        };

        let err = workflow
            .run("vault", &KeySelector::Key("set/one.bin".into()), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
        assert!(!dir.path().join("one.bin").exists());
    }
}
