//! Streaming retrieval of recalled objects to local files.
//!
//! The local file is named after the final path segment of the key, so two
//! keys with the same basename fetched in one run land on the same file and
//! the later one wins. Batch fetches log such collisions up front.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::fanout::{BatchResult, FanOut};
use crate::store::{ArchiveStore, target};

const CHUNK_SIZE: usize = 64 * 1024;

/// A fetched object on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    /// Key the artifact was fetched from.
    pub key: String,
    /// Local file written.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// Downloads objects into a local directory.
#[derive(Clone)]
pub struct RetrievalManager {
    store: Arc<dyn ArchiveStore>,
    download_dir: PathBuf,
}

impl RetrievalManager {
    /// Creates a manager writing into `download_dir`.
    #[must_use]
    pub fn new(store: Arc<dyn ArchiveStore>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            download_dir: download_dir.into(),
        }
    }

    /// Directory artifacts are written to.
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Returns the local file name for a key: its final path segment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the key has no usable final
    /// segment (empty, `.` or `..`).
    pub fn local_name(key: &str) -> Result<&str> {
        let name = key
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        match name {
            "" | "." | ".." => Err(Error::configuration(format!(
                "key '{key}' has no usable file name"
            ))),
            name => Ok(name),
        }
    }

    /// Groups keys that map to the same local file name.
    ///
    /// Only groups with more than one key are returned.
    #[must_use]
    pub fn basename_collisions<'a, I>(keys: I) -> Vec<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut by_name: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for key in keys {
            if let Ok(name) = Self::local_name(key) {
                by_name.entry(name).or_default().push(key.to_string());
            }
        }
        by_name.into_values().filter(|keys| keys.len() > 1).collect()
    }

    /// Streams one object to `<download_dir>/<basename>`.
    ///
    /// The object must already be readable; an archived object that has not
    /// been recalled fails with the service's error.
    ///
    /// # Errors
    ///
    /// Returns a communication error if the request or the body stream fails,
    /// and an I/O error if the local file cannot be written.
    pub async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedArtifact> {
        let path = self.download_dir.join(Self::local_name(key)?);
        let mut reader = self.store.get_object(bucket, key).await?;

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| Error::io(&path, e))?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;
        loop {
            let n = reader.read(&mut buf).await.map_err(|e| Error::Communication {
                operation: "get_object",
                target: target(bucket, key),
                code: None,
                message: format!("body stream interrupted: {e}"),
                source: Some(Box::new(e)),
            })?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .await
                .map_err(|e| Error::io(&path, e))?;
            written += n as u64;
        }
        file.flush().await.map_err(|e| Error::io(&path, e))?;

        tracing::info!(bucket, key, file = %path.display(), bytes = written, "restored");
        Ok(FetchedArtifact {
            key: key.to_string(),
            path,
            bytes: written,
        })
    }

    /// Fetches every key concurrently; at least one must succeed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuccess`] if every fetch failed.
    pub async fn fetch_all(
        &self,
        bucket: &str,
        keys: Vec<String>,
        fan_out: &FanOut,
    ) -> Result<BatchResult<FetchedArtifact>> {
        for group in Self::basename_collisions(keys.iter().map(String::as_str)) {
            tracing::warn!(
                bucket,
                keys = ?group,
                "keys share a file name; later downloads overwrite earlier ones"
            );
        }

        let manager = self.clone();
        let bucket_name = bucket.to_string();
        let batch = fan_out
            .clone()
            .labeled("fetch", bucket)
            .run(keys, move |key| {
                let manager = manager.clone();
                let bucket = bucket_name.clone();
                async move { manager.fetch(&bucket, &key).await }
            })
            .await;
        batch.into_policy_result("fetch")
    }
}

impl std::fmt::Debug for RetrievalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalManager")
            .field("download_dir", &self.download_dir)
            .finish_non_exhaustive()
    }
}
