//! List-buckets command - report every visible bucket.

use anyhow::Result;
use async_trait::async_trait;
use thaw_core::inventory::Inventory;
use thaw_core::report::{ReportKind, ReportWriter};

use crate::registry::Operation;
use crate::session::Session;

/// Writes a `Name,Creation Date` report of all buckets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListBuckets;

#[async_trait]
impl Operation for ListBuckets {
    fn name(&self) -> &'static str {
        "list-buckets"
    }

    fn summary(&self) -> &'static str {
        "List all buckets with their creation dates"
    }

    async fn run(&self, session: &Session) -> Result<()> {
        let buckets = Inventory::new(session.store()?).list_buckets().await?;

        let mut writer = ReportWriter::new(session.open_output()?, ReportKind::BucketListing)?;
        for bucket in &buckets {
            writer.write_row(bucket)?;
        }
        writer.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use thaw_core::{MemoryStore, StorageClass};

    use super::*;
    use crate::Config;

    #[tokio::test]
    async fn writes_one_row_per_bucket() {
        let store = MemoryStore::new();
        store.create_bucket("alpha").unwrap();
        store
            .put_object("beta", "k", "v", StorageClass::Standard)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("buckets.csv");
        let config = Config {
            out: Some(out.clone()),
            ..Config::default()
        };
        let session = Session::with_store(config, Arc::new(store));
        ListBuckets.run(&session).await.unwrap();

        let report = std::fs::read_to_string(out).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "Name,Creation Date");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("alpha,"));
        assert!(lines[2].starts_with("beta,"));
        assert!(lines[1].ends_with(" UTC"));
    }
}
