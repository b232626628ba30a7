//! Get-object command - download a key or every object under a prefix.

use anyhow::Result;
use async_trait::async_trait;
use thaw_core::KeySelector;
use thaw_core::inventory::Inventory;
use thaw_core::retrieval::RetrievalManager;

use crate::registry::Operation;
use crate::session::Session;

/// Downloads objects into the download directory, named by key basename.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetObject;

#[async_trait]
impl Operation for GetObject {
    fn name(&self) -> &'static str {
        "get-object"
    }

    fn summary(&self) -> &'static str {
        "Download a key, or every object under a prefix"
    }

    async fn run(&self, session: &Session) -> Result<()> {
        let bucket = session.bucket()?;
        let store = session.store()?;
        let retrieval = RetrievalManager::new(store.clone(), &session.config().download_dir);

        match session.selector()? {
            KeySelector::Key(key) => {
                let artifact = retrieval.fetch(bucket, &key).await?;
                println!("Restored: {}", artifact.path.display());
            }
            KeySelector::Prefix(prefix) => {
                let keys: Vec<String> = Inventory::new(store)
                    .list_required(bucket, &prefix)
                    .await?
                    .into_iter()
                    .map(|o| o.key)
                    .collect();
                let batch = retrieval.fetch_all(bucket, keys, &session.fan_out()).await?;
                for (_, artifact) in batch.successes() {
                    println!("Restored: {}", artifact.path.display());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use thaw_core::{Error, MemoryStore, StorageClass};

    use super::*;
    use crate::Config;

    fn session(store: Arc<MemoryStore>, dir: &std::path::Path, prefix: &str) -> Session {
        let config = Config {
            bucket: Some("vault".to_string()),
            prefix: Some(prefix.to_string()),
            download_dir: dir.to_path_buf(),
            ..Config::default()
        };
        Session::with_store(config, store)
    }

    #[tokio::test]
    async fn prefix_download_tolerates_unrecalled_objects() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_object("vault", "docs/readme.txt", "hello", StorageClass::Standard)
            .unwrap();
        store
            .put_object("vault", "docs/cold.txt", "frozen", StorageClass::Archive)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();

        GetObject.run(&session(store, dir.path(), "docs/")).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("readme.txt")).unwrap(),
            "hello"
        );
        assert!(!dir.path().join("cold.txt").exists());
    }

    #[tokio::test]
    async fn prefix_download_fails_when_nothing_is_readable() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_object("vault", "docs/cold.txt", "frozen", StorageClass::Archive)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = GetObject
            .run(&session(store, dir.path(), "docs/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NoSuccess { .. })
        ));
    }

    #[tokio::test]
    async fn empty_prefix_match_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("vault").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = GetObject
            .run(&session(store, dir.path(), "nothing/"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: no objects match bucket vault and prefix nothing/"
        );
    }
}
