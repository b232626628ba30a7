//! List-objects command - stream an inventory report of a bucket.

use anyhow::Result;
use async_trait::async_trait;
use thaw_core::inventory::Inventory;
use thaw_core::report::{ReportKind, ReportWriter};

use crate::registry::Operation;
use crate::session::Session;

/// Writes a `Key,Size,Storage Class,Last Modified` report, one page at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListObjects;

#[async_trait]
impl Operation for ListObjects {
    fn name(&self) -> &'static str {
        "list-objects"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["inventory"]
    }

    fn summary(&self) -> &'static str {
        "Inventory the objects in a bucket, optionally under a prefix"
    }

    async fn run(&self, session: &Session) -> Result<()> {
        let bucket = session.bucket()?;
        let prefix = session.prefix();

        let mut writer = ReportWriter::new(session.open_output()?, ReportKind::ObjectInventory)?;
        let total = Inventory::new(session.store()?)
            .for_each_page(bucket, prefix, |page| {
                for object in &page.objects {
                    writer.write_row(object)?;
                }
                Ok(())
            })
            .await?;
        writer.finish()?;

        tracing::info!(bucket, prefix, objects = total, "inventory written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use thaw_core::{MemoryStore, StorageClass};

    use super::*;
    use crate::Config;

    fn session(store: MemoryStore, out: &std::path::Path, prefix: Option<&str>) -> Session {
        let config = Config {
            bucket: Some("vault".to_string()),
            prefix: prefix.map(str::to_string),
            out: Some(out.to_path_buf()),
            ..Config::default()
        };
        Session::with_store(config, Arc::new(store))
    }

    #[tokio::test]
    async fn inventory_spans_pages() {
        let store = MemoryStore::new();
        for i in 0..250 {
            let class = if i % 2 == 0 { StorageClass::Archive } else { StorageClass::Standard };
            store
                .put_object("vault", &format!("logs/{i:04}"), "abc", class)
                .unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("inventory.csv");

        ListObjects.run(&session(store, &out, None)).await.unwrap();

        let report = std::fs::read_to_string(out).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "Key,Size,Storage Class,Last Modified");
        assert_eq!(lines.len(), 251);
        assert!(lines[1].starts_with("logs/0000,3,GLACIER,"));
        assert!(lines[2].starts_with("logs/0001,3,STANDARD,"));
    }

    #[tokio::test]
    async fn prefix_filters_rows() {
        let store = MemoryStore::new();
        store.put_object("vault", "a/1", "x", StorageClass::Archive).unwrap();
        store.put_object("vault", "b/1", "x", StorageClass::Archive).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("inventory.csv");

        ListObjects.run(&session(store, &out, Some("b/"))).await.unwrap();

        let report = std::fs::read_to_string(out).unwrap();
        assert_eq!(report.lines().count(), 2);
        assert!(report.contains("b/1,1,GLACIER,"));
    }

    #[tokio::test]
    async fn bucket_is_required() {
        let session = Session::with_store(Config::default(), Arc::new(MemoryStore::new()));
        let err = ListObjects.run(&session).await.unwrap_err();
        assert_eq!(err.to_string(), "configuration error: must specify bucket");
    }
}
