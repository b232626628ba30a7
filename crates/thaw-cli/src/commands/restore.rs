//! Recall commands - request recalls, inspect their status, and run the full
//! recall workflow.

use anyhow::{Context, Result};
use async_trait::async_trait;
use thaw_core::recall::RecallCoordinator;
use thaw_core::workflow::{RecallWorkflow, WorkflowOptions};

use crate::registry::Operation;
use crate::session::Session;

/// Requests a recall of a key or every object under a prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Restore;

#[async_trait]
impl Operation for Restore {
    fn name(&self) -> &'static str {
        "restore"
    }

    fn summary(&self) -> &'static str {
        "Request recall of a key, or of every object under a prefix"
    }

    async fn run(&self, session: &Session) -> Result<()> {
        let bucket = session.bucket()?;
        let selector = session.selector()?;
        let batch = RecallCoordinator::new(session.store()?)
            .recall_selection(bucket, &selector)
            .await?;
        for (key, _) in batch.successes() {
            println!("Restore requested: {key}");
        }
        for (key, err) in batch.failures() {
            println!("Restore request failed: {key} {err}");
        }
        Ok(())
    }
}

/// Shows an object's recall status.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadObject;

#[async_trait]
impl Operation for HeadObject {
    fn name(&self) -> &'static str {
        "head-object"
    }

    fn summary(&self) -> &'static str {
        "Show the recall status of a key"
    }

    async fn run(&self, session: &Session) -> Result<()> {
        let bucket = session.bucket()?;
        let key = session.key()?;
        let status = session.store()?.head_object(bucket, key).await?;
        println!(
            "Restore request: {}",
            status.restore_header.as_deref().unwrap_or("none")
        );
        println!("Storage class: {}", status.storage_class);
        Ok(())
    }
}

/// Recalls, waits for readiness, and optionally downloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreAndWaitAndFetch;

#[async_trait]
impl Operation for RestoreAndWaitAndFetch {
    fn name(&self) -> &'static str {
        "restore-and-wait-and-fetch"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["restore-from-glacier"]
    }

    fn summary(&self) -> &'static str {
        "Recall a key or prefix, wait until ready, then download it"
    }

    async fn run(&self, session: &Session) -> Result<()> {
        let config = session.config();
        let bucket = session.bucket()?;
        let selector = session.selector()?;
        let options = WorkflowOptions {
            download: config.download,
            cancel: session.cancellation().clone(),
            wait_timeout: config.wait_timeout,
            fan_out: session.fan_out(),
        };

        let report = RecallWorkflow::new(session.store()?, &config.download_dir)
            .run(bucket, &selector, &options)
            .await
            .with_context(|| format!("failed to restore from bucket {bucket}"))?;

        for (key, poll) in report.ready.successes() {
            println!(
                "Ready for download: {key} ({} checks, {}s)",
                poll.checks,
                poll.waited.as_secs()
            );
        }
        if let Some(fetched) = &report.fetched {
            for (_, artifact) in fetched.successes() {
                println!("Restored: {}", artifact.path.display());
            }
        }
        Ok(())
    }
}
