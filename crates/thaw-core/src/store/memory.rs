//! In-memory archive store.
//!
//! Simulates the parts of an archive-tier object service the engine depends on:
//! archived objects cannot be read until recalled, and a recall stays in
//! progress for a configurable number of status checks before completing.
//! Thread-safe via `RwLock`. Not suitable for production.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::ops::Range;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{ArchiveStore, ObjectPage, ObjectReader, target};
use crate::error::{Error, Result};
use crate::object::{BucketDescriptor, ObjectDescriptor, ObjectStatus, RestoreStatus, StorageClass};

/// In-memory storage backend for tests and local simulation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buckets: Arc<RwLock<BTreeMap<String, MemoryBucket>>>,
    restore_checks: u32,
}

#[derive(Debug)]
struct MemoryBucket {
    created: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    storage_class: StorageClass,
    last_modified: DateTime<Utc>,
    recall: RecallState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecallState {
    NotRequested,
    Pending { remaining_checks: u32 },
    Done,
}

impl StoredObject {
    fn readable(&self) -> bool {
        !self.storage_class.is_archive() || self.recall == RecallState::Done
    }

    fn restore_header(&self) -> Option<String> {
        match self.recall {
            RecallState::NotRequested => None,
            RecallState::Pending { .. } => Some("ongoing-request=\"true\"".to_string()),
            RecallState::Done => Some(format!(
                "ongoing-request=\"false\", expiry-date=\"{}\"",
                (self.last_modified + chrono::Duration::days(1)).format("%a, %d %b %Y %H:%M:%S GMT")
            )),
        }
    }
}

fn poisoned() -> Error {
    Error::communication("memory_store", "memory", "lock poisoned")
}

impl MemoryStore {
    /// Creates an empty store where recalls complete on the first status check.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps each recall in progress for `checks` status queries.
    #[must_use]
    pub fn with_restore_checks(mut self, checks: u32) -> Self {
        self.restore_checks = checks;
        self
    }

    /// Creates a bucket if it does not already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.buckets.write().map_err(|_| poisoned())?;
        buckets
            .entry(bucket.to_string())
            .or_insert_with(|| MemoryBucket {
                created: Utc::now(),
                objects: BTreeMap::new(),
            });
        Ok(())
    }

    /// Stores an object, creating its bucket on demand.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        storage_class: StorageClass,
    ) -> Result<()> {
        self.create_bucket(bucket)?;
        let mut buckets = self.buckets.write().map_err(|_| poisoned())?;
        if let Some(entry) = buckets.get_mut(bucket) {
            entry.objects.insert(
                key.to_string(),
                StoredObject {
                    data: data.into(),
                    storage_class,
                    last_modified: Utc::now(),
                    recall: RecallState::NotRequested,
                },
            );
        }
        Ok(())
    }

    /// Returns true if the object exists.
    #[must_use]
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .read()
            .map(|b| b.get(bucket).is_some_and(|b| b.objects.contains_key(key)))
            .unwrap_or(false)
    }

    /// Returns true once a recall of the object has completed.
    #[must_use]
    pub fn is_restored(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .read()
            .map(|b| {
                b.get(bucket)
                    .and_then(|b| b.objects.get(key))
                    .is_some_and(|o| o.recall == RecallState::Done)
            })
            .unwrap_or(false)
    }

    fn with_object<T>(
        &self,
        operation: &'static str,
        bucket: &str,
        key: &str,
        missing_code: &str,
        f: impl FnOnce(&mut StoredObject) -> Result<T>,
    ) -> Result<T> {
        let mut buckets = self.buckets.write().map_err(|_| poisoned())?;
        let entry = buckets.get_mut(bucket).ok_or_else(|| {
            Error::service(
                operation,
                bucket,
                "NoSuchBucket",
                "The specified bucket does not exist",
            )
        })?;
        let object = entry.objects.get_mut(key).ok_or_else(|| {
            Error::service(
                operation,
                target(bucket, key),
                missing_code,
                "The specified key does not exist",
            )
        })?;
        f(object)
    }

    fn readable_data(&self, operation: &'static str, bucket: &str, key: &str) -> Result<Bytes> {
        self.with_object(operation, bucket, key, "NoSuchKey", |object| {
            if object.readable() {
                Ok(object.data.clone())
            } else {
                Err(Error::service(
                    operation,
                    target(bucket, key),
                    "InvalidObjectState",
                    "The operation is not valid for the object's storage class",
                ))
            }
        })
    }
}

#[async_trait]
impl ArchiveStore for MemoryStore {
    async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>> {
        let buckets = self.buckets.read().map_err(|_| poisoned())?;
        Ok(buckets
            .iter()
            .map(|(name, bucket)| BucketDescriptor {
                name: name.clone(),
                created: Some(bucket.created),
            })
            .collect())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: usize,
    ) -> Result<ObjectPage> {
        let buckets = self.buckets.read().map_err(|_| poisoned())?;
        let entry = buckets.get(bucket).ok_or_else(|| {
            Error::service(
                "list_objects",
                bucket,
                "NoSuchBucket",
                "The specified bucket does not exist",
            )
        })?;

        let max_keys = max_keys.max(1);
        let mut matching = entry
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation_token.map_or(true, |token| key.as_str() > token));

        let objects: Vec<ObjectDescriptor> = matching
            .by_ref()
            .take(max_keys)
            .map(|(key, object)| ObjectDescriptor {
                key: key.clone(),
                size: object.data.len() as u64,
                storage_class: object.storage_class.clone(),
                last_modified: Some(object.last_modified),
            })
            .collect();

        let next_continuation_token = if matching.next().is_some() {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_continuation_token,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectStatus> {
        self.with_object("head_object", bucket, key, "NotFound", |object| {
            if let RecallState::Pending { remaining_checks } = object.recall {
                object.recall = if remaining_checks == 0 {
                    RecallState::Done
                } else {
                    RecallState::Pending {
                        remaining_checks: remaining_checks - 1,
                    }
                };
                if object.recall == RecallState::Done {
                    object.last_modified = Utc::now();
                }
            }
            let restore_header = object.restore_header();
            Ok(ObjectStatus {
                key: key.to_string(),
                size: object.data.len() as u64,
                storage_class: object.storage_class.clone(),
                last_modified: Some(object.last_modified),
                restore: RestoreStatus::parse(restore_header.as_deref()),
                restore_header,
            })
        })
    }

    async fn restore_object(&self, bucket: &str, key: &str) -> Result<()> {
        let checks = self.restore_checks;
        self.with_object("restore_object", bucket, key, "NoSuchKey", |object| {
            if !object.storage_class.is_archive() {
                return Err(Error::service(
                    "restore_object",
                    target(bucket, key),
                    "InvalidObjectState",
                    "Restore is not allowed for the object's current storage class",
                ));
            }
            match object.recall {
                RecallState::Pending { .. } => Err(Error::service(
                    "restore_object",
                    target(bucket, key),
                    "RestoreAlreadyInProgress",
                    "Object restore is already in progress",
                )),
                RecallState::Done => Ok(()),
                RecallState::NotRequested => {
                    object.recall = if checks == 0 {
                        RecallState::Done
                    } else {
                        RecallState::Pending {
                            remaining_checks: checks,
                        }
                    };
                    Ok(())
                }
            }
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        let data = self.readable_data("get_object", bucket, key)?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn get_object_range(
        &self,
        bucket: &str,
        key: &str,
        range: Range<u64>,
    ) -> Result<Bytes> {
        if range.end <= range.start {
            return Err(Error::configuration(format!(
                "invalid range {}..{}",
                range.start, range.end
            )));
        }
        let data = self.readable_data("get_object_range", bucket, key)?;
        let len = data.len();
        let start = usize::try_from(range.start).unwrap_or(usize::MAX);
        if start > len {
            return Err(Error::service(
                "get_object_range",
                target(bucket, key),
                "InvalidRange",
                format!("range start {start} exceeds object length {len}"),
            ));
        }
        let end = usize::try_from(range.end).unwrap_or(usize::MAX).min(len);
        Ok(data.slice(start..end))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut buckets = self.buckets.write().map_err(|_| poisoned())?;
        let entry = buckets.get_mut(bucket).ok_or_else(|| {
            Error::service(
                "delete_object",
                bucket,
                "NoSuchBucket",
                "The specified bucket does not exist",
            )
        })?;
        entry.objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn seeded(checks: u32) -> MemoryStore {
        let store = MemoryStore::new().with_restore_checks(checks);
        store
            .put_object("vault", "cold/a.bin", "archived", StorageClass::Archive)
            .unwrap();
        store
            .put_object("vault", "warm/b.bin", "hello world", StorageClass::Standard)
            .unwrap();
        store
    }

    #[tokio::test]
    async fn archived_object_unreadable_until_recalled() {
        let store = seeded(2);

        let err = store.get_object("vault", "cold/a.bin").await.err().unwrap();
        assert_eq!(err.code(), Some("InvalidObjectState"));

        store.restore_object("vault", "cold/a.bin").await.unwrap();
        let status = store.head_object("vault", "cold/a.bin").await.unwrap();
        assert!(status.restore.is_in_progress());
        let status = store.head_object("vault", "cold/a.bin").await.unwrap();
        assert!(status.restore.is_in_progress());
        let status = store.head_object("vault", "cold/a.bin").await.unwrap();
        assert!(matches!(status.restore, RestoreStatus::Completed { expiry: Some(_) }));

        let mut reader = store.get_object("vault", "cold/a.bin").await.unwrap();
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"archived");
    }

    #[tokio::test]
    async fn duplicate_recall_while_in_progress_is_rejected() {
        let store = seeded(3);
        store.restore_object("vault", "cold/a.bin").await.unwrap();
        let err = store.restore_object("vault", "cold/a.bin").await.unwrap_err();
        assert_eq!(err.code(), Some("RestoreAlreadyInProgress"));
    }

    #[tokio::test]
    async fn recall_of_standard_object_is_rejected() {
        let store = seeded(0);
        let err = store.restore_object("vault", "warm/b.bin").await.unwrap_err();
        assert_eq!(err.code(), Some("InvalidObjectState"));
    }

    #[tokio::test]
    async fn head_of_unrecalled_object_has_no_restore_header() {
        let store = seeded(0);
        let status = store.head_object("vault", "cold/a.bin").await.unwrap();
        assert_eq!(status.restore, RestoreStatus::NotRequested);
        assert!(status.restore_header.is_none());
        assert_eq!(status.storage_class, StorageClass::Archive);
    }

    #[tokio::test]
    async fn missing_key_and_bucket_codes() {
        let store = seeded(0);
        let err = store.head_object("vault", "nope").await.unwrap_err();
        assert_eq!(err.code(), Some("NotFound"));
        let err = store.get_object("vault", "nope").await.err().unwrap();
        assert_eq!(err.code(), Some("NoSuchKey"));
        let err = store.list_objects("other", "", None, 10).await.unwrap_err();
        assert_eq!(err.code(), Some("NoSuchBucket"));
    }

    #[tokio::test]
    async fn range_reads_clamp_to_length() {
        let store = seeded(0);
        let bytes = store
            .get_object_range("vault", "warm/b.bin", 0..2)
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from("he"));
        let bytes = store
            .get_object_range("vault", "warm/b.bin", 6..100)
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from("world"));
        assert!(store
            .get_object_range("vault", "warm/b.bin", 50..60)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn listing_pages_in_key_order() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .put_object("vault", &format!("k{i}"), "x", StorageClass::Standard)
                .unwrap();
        }
        store
            .put_object("vault", "other", "x", StorageClass::Standard)
            .unwrap();

        let first = store.list_objects("vault", "k", None, 2).await.unwrap();
        assert_eq!(
            first.objects.iter().map(|o| o.key.as_str()).collect::<Vec<_>>(),
            ["k0", "k1"]
        );
        assert!(first.is_truncated());

        let second = store
            .list_objects("vault", "k", first.next_continuation_token.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(second.objects[0].key, "k2");

        let last = store.list_objects("vault", "k", Some("k3"), 2).await.unwrap();
        assert_eq!(last.objects.len(), 1);
        assert!(!last.is_truncated());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = seeded(0);
        store.delete_object("vault", "warm/b.bin").await.unwrap();
        assert!(!store.contains("vault", "warm/b.bin"));
        store.delete_object("vault", "warm/b.bin").await.unwrap();
    }
}
