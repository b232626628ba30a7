//! Pre-built test fixtures for common recall scenarios.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use thaw_core::{ArchiveStore, MemoryStore, StorageClass};

use crate::store::TracingStore;

/// Bucket used by [`TestContext`].
pub const TEST_BUCKET: &str = "vault";

/// Seeded store plus a scratch download directory.
pub struct TestContext {
    /// Instrumented store.
    pub store: Arc<TracingStore>,
    /// Bucket name.
    pub bucket: String,
    dir: TempDir,
}

impl TestContext {
    /// Creates a context whose recalls complete on the first status check.
    #[must_use]
    pub fn new() -> Self {
        Self::with_restore_checks(0)
    }

    /// Creates a context whose recalls stay in progress for `checks` status
    /// queries.
    #[must_use]
    pub fn with_restore_checks(checks: u32) -> Self {
        let memory = MemoryStore::new().with_restore_checks(checks);
        memory.create_bucket(TEST_BUCKET).expect("create bucket");
        Self {
            store: Arc::new(TracingStore::new(memory)),
            bucket: TEST_BUCKET.to_string(),
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    /// Adds an archive-tier object.
    #[must_use]
    pub fn archived(self, key: &str, data: impl Into<bytes::Bytes>) -> Self {
        self.put(key, data, StorageClass::Archive)
    }

    /// Adds an immediately readable object.
    #[must_use]
    pub fn standard(self, key: &str, data: impl Into<bytes::Bytes>) -> Self {
        self.put(key, data, StorageClass::Standard)
    }

    /// Adds `count` archive objects named `{prefix}{index:04}`.
    #[must_use]
    pub fn archived_set(self, prefix: &str, count: usize) -> Self {
        (0..count).fold(self, |ctx, i| {
            let key = format!("{prefix}{i:04}");
            let data = key.clone().into_bytes();
            ctx.archived(&key, data)
        })
    }

    fn put(self, key: &str, data: impl Into<bytes::Bytes>, class: StorageClass) -> Self {
        self.store
            .inner()
            .put_object(&self.bucket, key, data, class)
            .expect("put object");
        self
    }

    /// The store as the engine sees it.
    pub fn archive_store(&self) -> Arc<dyn ArchiveStore> {
        self.store.clone()
    }

    /// Scratch directory for downloads.
    pub fn download_dir(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
