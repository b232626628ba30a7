//! Instrumented store with operation tracing and fault injection.
//!
//! Wraps a [`MemoryStore`] and records every call for test assertions.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use thaw_core::error::{Error, Result};
use thaw_core::object::{BucketDescriptor, ObjectStatus};
use thaw_core::store::{ArchiveStore, MemoryStore, ObjectPage, ObjectReader};

/// Record of a store call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Bucket listing.
    ListBuckets,
    /// One page of an object listing.
    ListObjects {
        /// Prefix that was listed.
        prefix: String,
        /// Continuation token, absent for the first page.
        token: Option<String>,
    },
    /// Status query.
    Head {
        /// Key that was checked.
        key: String,
    },
    /// Recall request.
    Restore {
        /// Key that was recalled.
        key: String,
    },
    /// Full read.
    Get {
        /// Key that was read.
        key: String,
    },
    /// Range read.
    GetRange {
        /// Key that was read.
        key: String,
        /// Start byte offset.
        start: u64,
        /// End byte offset (exclusive).
        end: u64,
    },
    /// Delete.
    Delete {
        /// Key that was deleted.
        key: String,
    },
}

impl StoreOp {
    /// Store operation name, as used for fault injection.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListBuckets => "list_buckets",
            Self::ListObjects { .. } => "list_objects",
            Self::Head { .. } => "head_object",
            Self::Restore { .. } => "restore_object",
            Self::Get { .. } => "get_object",
            Self::GetRange { .. } => "get_object_range",
            Self::Delete { .. } => "delete_object",
        }
    }
}

#[derive(Debug, Clone)]
struct Fault {
    operation: &'static str,
    key_prefix: String,
    code: String,
}

/// [`MemoryStore`] wrapper that records calls, fails on demand, and tracks
/// how many calls were in flight at once.
#[derive(Debug, Clone, Default)]
pub struct TracingStore {
    inner: MemoryStore,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    faults: Arc<Mutex<Vec<Fault>>>,
    truncated: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TracingStore {
    /// Wraps `inner`; clones of `inner` share its contents.
    #[must_use]
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// The wrapped store, for seeding and inspection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Returns all recorded operations.
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Number of recorded calls to `operation`.
    pub fn count(&self, operation: &str) -> usize {
        self.operations
            .lock()
            .expect("lock")
            .iter()
            .filter(|op| op.name() == operation)
            .count()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Fails `operation` with service code `code` for keys starting with
    /// `key_prefix`.
    pub fn inject_failure(
        &self,
        operation: &'static str,
        key_prefix: impl Into<String>,
        code: impl Into<String>,
    ) {
        self.faults.lock().expect("lock").push(Fault {
            operation,
            key_prefix: key_prefix.into(),
            code: code.into(),
        });
    }

    /// Range reads of keys starting with `key_prefix` get a response whose
    /// body breaks before any byte arrives.
    pub fn truncate_reads(&self, key_prefix: impl Into<String>) {
        self.truncated.lock().expect("lock").push(key_prefix.into());
    }

    /// Clears all injected faults.
    pub fn clear_failures(&self) {
        self.faults.lock().expect("lock").clear();
        self.truncated.lock().expect("lock").clear();
    }

    /// Highest number of calls observed in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: StoreOp) -> Result<InFlight<'_>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight {
            counter: &self.in_flight,
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.check_failure(&op)?;
        self.operations.lock().expect("lock").push(op);
        Ok(guard)
    }

    fn check_failure(&self, op: &StoreOp) -> Result<()> {
        let key: &str = match op {
            StoreOp::ListBuckets => "",
            StoreOp::ListObjects { prefix, .. } => prefix.as_str(),
            StoreOp::Head { key }
            | StoreOp::Restore { key }
            | StoreOp::Get { key }
            | StoreOp::GetRange { key, .. }
            | StoreOp::Delete { key } => key.as_str(),
        };
        let faults = self.faults.lock().expect("lock");
        match faults
            .iter()
            .find(|f| f.operation == op.name() && key.starts_with(&f.key_prefix))
        {
            Some(fault) => Err(Error::service(
                op.name(),
                key,
                fault.code.clone(),
                format!("injected failure for {key}"),
            )),
            None => Ok(()),
        }
    }

    fn is_truncated(&self, key: &str) -> bool {
        self.truncated
            .lock()
            .expect("lock")
            .iter()
            .any(|prefix| key.starts_with(prefix))
    }
}

#[async_trait::async_trait]
impl ArchiveStore for TracingStore {
    async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>> {
        let _guard = self.enter(StoreOp::ListBuckets).await?;
        self.inner.list_buckets().await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> Result<ObjectPage> {
        let _guard = self
            .enter(StoreOp::ListObjects {
                prefix: prefix.to_string(),
                token: continuation_token.map(str::to_string),
            })
            .await?;
        self.inner
            .list_objects(bucket, prefix, continuation_token, max_keys)
            .await
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectStatus> {
        let _guard = self.enter(StoreOp::Head { key: key.to_string() }).await?;
        self.inner.head_object(bucket, key).await
    }

    async fn restore_object(&self, bucket: &str, key: &str) -> Result<()> {
        let _guard = self.enter(StoreOp::Restore { key: key.to_string() }).await?;
        self.inner.restore_object(bucket, key).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        let _guard = self.enter(StoreOp::Get { key: key.to_string() }).await?;
        self.inner.get_object(bucket, key).await
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: Range<u64>,
    ) -> Result<Bytes> {
        let _guard = self
            .enter(StoreOp::GetRange {
                key: key.to_string(),
                start: range.start,
                end: range.end,
            })
            .await?;
        let bytes = self.inner.get_object_range(bucket, key, range).await?;
        if self.is_truncated(key) {
            return Ok(Bytes::new());
        }
        Ok(bytes)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let _guard = self.enter(StoreOp::Delete { key: key.to_string() }).await?;
        self.inner.delete_object(bucket, key).await
    }
}
