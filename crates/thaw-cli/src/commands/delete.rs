//! Delete-object command.

use anyhow::Result;
use async_trait::async_trait;

use crate::registry::Operation;
use crate::session::Session;

/// Deletes a single key.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteObject;

#[async_trait]
impl Operation for DeleteObject {
    fn name(&self) -> &'static str {
        "delete-object"
    }

    fn summary(&self) -> &'static str {
        "Delete a key"
    }

    async fn run(&self, session: &Session) -> Result<()> {
        let bucket = session.bucket()?;
        let key = session.key()?;
        session.store()?.delete_object(bucket, key).await?;
        tracing::info!(bucket, key, "deleted");
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
    async fn deletes_the_key() {
        let store = Arc::new(MemoryStore::new());
        store.put_object("vault", "old.bin", "x", StorageClass::Standard).unwrap();
        let config = Config {
            bucket: Some("vault".to_string()),
            key: Some("old.bin".to_string()),
            ..Config::default()
        };

        DeleteObject
            .run(&Session::with_store(config, store.clone()))
            .await
            .unwrap();
        assert!(!store.contains("vault", "old.bin"));
    }

    #[tokio::test]
    async fn prefix_alone_is_not_enough() {
        let config = Config {
            bucket: Some("vault".to_string()),
            prefix: Some("old/".to_string()),
            ..Config::default()
        };
        let session = Session::with_store(config, Arc::new(MemoryStore::new()));
        let err = DeleteObject.run(&session).await.unwrap_err();
        assert_eq!(err.to_string(), "configuration error: must specify key");
    }
}
