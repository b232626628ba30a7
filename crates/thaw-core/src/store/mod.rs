//! Storage-service contract consumed by the recall engine.
//!
//! The engine never speaks the service protocol itself. It is handed an
//! [`ArchiveStore`] and relies on it for transport, authentication and
//! transport-level retries.
//!
//! ## Implementations
//!
//! - [`MemoryStore`]: in-process simulation with archive-tier recall semantics
//! - [`S3Store`]: S3-compatible service via `aws-sdk-s3`
//!
//! ## Error contract
//!
//! Every transport or service failure surfaces as
//! [`Error::Communication`](crate::Error::Communication) carrying the service
//! error code when one was returned.

use std::ops::Range;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::object::{BucketDescriptor, ObjectDescriptor, ObjectStatus};

pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::{S3Config, S3Store};

/// Streaming body of an object.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// One page of an object listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    /// Objects on this page, in key order.
    pub objects: Vec<ObjectDescriptor>,
    /// Token for the next page; `None` on the last page.
    pub next_continuation_token: Option<String>,
}

impl ObjectPage {
    /// Returns true when more pages remain.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.next_continuation_token.is_some()
    }
}

/// Object storage service with archive-tier recall.
///
/// Implementations must be safe to share across concurrent tasks.
#[async_trait]
pub trait ArchiveStore: Send + Sync + 'static {
    /// Lists all buckets visible to the caller.
    async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>>;

    /// Lists one page of objects under `prefix`, in lexicographic key order.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> Result<ObjectPage>;

    /// Queries an object's metadata and recall status.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectStatus>;

    /// Requests an asynchronous recall of an archived object.
    ///
    /// Success means the request was accepted, not that the recall finished.
    async fn restore_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Opens the full object body as a stream.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader>;

    /// Reads a byte range (`range.end` exclusive).
    ///
    /// Once the service has answered, a failure while reading the body is not
    /// an error: the bytes received so far (possibly none) are returned.
    async fn get_object_range(&self, bucket: &str, key: &str, range: Range<u64>)
    -> Result<Bytes>;

    /// Deletes an object. Deleting a missing object succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}

/// Formats `bucket/key` for error targets and log fields.
#[must_use]
pub fn target(bucket: &str, key: &str) -> String {
    format!("{bucket}/{key}")
}
