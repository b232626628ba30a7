//! Retrievability verification.
//!
//! A probe is a two-byte ranged read. If the service answers without a
//! communication error the object counts as restorable, however many bytes
//! actually came back. Archive-tier objects are never probed: they have not
//! been recalled, which is not a failure.
//!
//! With delete-on-fail enabled, an unrestorable non-archive object is deleted.
//! The delete's outcome is recorded next to the probe result and never changes
//! it.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::error::Result;
use crate::fanout::{BatchResult, FanOut};
use crate::object::ObjectDescriptor;
use crate::report::{ReportHandle, ReportRow};
use crate::store::ArchiveStore;

/// Byte range read by a probe.
pub const PROBE_RANGE: Range<u64> = 0..2;

/// Verification result for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    /// Object key.
    pub key: String,
    /// Whether the probe got a response.
    pub restorable: bool,
    /// Whether the object was deleted after failing.
    pub deleted: bool,
    /// Probe error, prefixed with `ERR: `.
    pub error: Option<String>,
    /// Delete error, prefixed with `ERR: `.
    pub delete_error: Option<String>,
}

impl VerificationRecord {
    fn new(key: impl Into<String>, restorable: bool) -> Self {
        Self {
            key: key.into(),
            restorable,
            deleted: false,
            error: None,
            delete_error: None,
        }
    }
}

impl ReportRow for VerificationRecord {
    fn fields(&self) -> Vec<String> {
        vec![
            self.key.clone(),
            self.restorable.to_string(),
            if self.deleted { "Deleted".to_string() } else { String::new() },
            self.error.clone().unwrap_or_default(),
            self.delete_error.clone().unwrap_or_default(),
        ]
    }
}

/// Probes objects for retrievability.
#[derive(Clone)]
pub struct VerificationSampler {
    store: Arc<dyn ArchiveStore>,
}

impl VerificationSampler {
    /// Creates a sampler over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self { store }
    }

    /// Issues a probe read and returns the number of bytes received.
    ///
    /// # Errors
    ///
    /// Returns a communication error if the service could not be reached or
    /// rejected the read.
    pub async fn probe(&self, bucket: &str, key: &str) -> Result<usize> {
        let bytes = self
            .store
            .get_object_range(bucket, key, PROBE_RANGE)
            .await?;
        tracing::debug!(bucket, key, bytes = bytes.len(), "probe answered");
        Ok(bytes.len())
    }

    /// Samples one object using the storage class from its listing.
    ///
    /// # Errors
    ///
    /// Returns the probe's communication error.
    pub async fn sample(&self, bucket: &str, object: &ObjectDescriptor) -> Result<VerificationRecord> {
        if object.storage_class.is_archive() {
            tracing::debug!(bucket, key = %object.key, "archived, not probed");
            return Ok(VerificationRecord::new(&object.key, false));
        }
        self.probe(bucket, &object.key).await?;
        Ok(VerificationRecord::new(&object.key, true))
    }

    /// Samples one object and, if it is not restorable, optionally deletes it.
    ///
    /// Probe errors are captured in the record rather than returned.
    pub async fn verify(
        &self,
        bucket: &str,
        object: &ObjectDescriptor,
        delete_on_fail: bool,
    ) -> VerificationRecord {
        let mut record = match self.sample(bucket, object).await {
            Ok(record) => record,
            Err(err) => {
                let mut record = VerificationRecord::new(&object.key, false);
                record.error = Some(format!("ERR: {err}"));
                record
            }
        };

        if !record.restorable && delete_on_fail && !object.storage_class.is_archive() {
            match self.store.delete_object(bucket, &object.key).await {
                Ok(()) => {
                    tracing::info!(bucket, key = %object.key, "deleted unrestorable object");
                    record.deleted = true;
                }
                Err(err) => {
                    tracing::warn!(bucket, key = %object.key, error = %err, "delete failed");
                    record.delete_error = Some(format!("ERR: {err}"));
                }
            }
        }
        record
    }

    /// Verifies every object concurrently, sending each record to `report`
    /// as soon as it is known.
    ///
    /// A key's outcome is an error only if its row could not be reported.
    pub async fn verify_all(
        &self,
        bucket: &str,
        objects: Vec<ObjectDescriptor>,
        delete_on_fail: bool,
        fan_out: &FanOut,
        report: &ReportHandle,
    ) -> BatchResult<VerificationRecord> {
        let keys: Vec<String> = objects.iter().map(|o| o.key.clone()).collect();
        let by_key: Arc<HashMap<String, ObjectDescriptor>> =
            Arc::new(objects.into_iter().map(|o| (o.key.clone(), o)).collect());

        let sampler = self.clone();
        let bucket_name = bucket.to_string();
        let report = report.clone();
        fan_out
            .clone()
            .labeled("verify", bucket)
            .run(keys, move |key| {
                let sampler = sampler.clone();
                let bucket = bucket_name.clone();
                let by_key = Arc::clone(&by_key);
                let report = report.clone();
                async move {
                    let record = match by_key.get(&key) {
                        Some(object) => sampler.verify(&bucket, object, delete_on_fail).await,
                        None => VerificationRecord::new(key, false),
                    };
                    report.send(&record).await?;
                    Ok(record)
                }
            })
            .await
    }
}

impl std::fmt::Debug for VerificationSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationSampler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::StorageClass;
    use crate::report::{ReportKind, ReportSink, ReportWriter};
    use crate::store::MemoryStore;

    fn descriptor(key: &str, storage_class: StorageClass) -> ObjectDescriptor {
        ObjectDescriptor {
            key: key.to_string(),
            size: 10,
            storage_class,
            last_modified: None,
        }
    }

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .put_object("vault", "warm.txt", "hello", StorageClass::Standard)
            .unwrap();
        store
            .put_object("vault", "cold.bin", "frozen", StorageClass::Archive)
            .unwrap();
        store
            .put_object("vault", "empty", "", StorageClass::Standard)
            .unwrap();
        store
    }

    #[tokio::test]
    async fn archived_objects_are_skipped_even_with_delete_on_fail() {
        let store = store();
        let sampler = VerificationSampler::new(Arc::clone(&store) as Arc<dyn ArchiveStore>);

        let record = sampler
            .verify("vault", &descriptor("cold.bin", StorageClass::Archive), true)
            .await;
        assert_eq!(record, VerificationRecord::new("cold.bin", false));
        assert!(store.contains("vault", "cold.bin"));
    }

    #[tokio::test]
    async fn empty_response_still_counts_as_restorable() {
        let sampler = VerificationSampler::new(store());
        assert_eq!(sampler.probe("vault", "empty").await.unwrap(), 0);
        let record = sampler
            .sample("vault", &descriptor("empty", StorageClass::Standard))
            .await
            .unwrap();
        assert!(record.restorable);
    }

    #[tokio::test]
    async fn probe_error_is_an_error_from_sample() {
        let sampler = VerificationSampler::new(store());
        let err = sampler
            .sample("vault", &descriptor("gone", StorageClass::Standard))
            .await
            .unwrap_err();
        assert!(err.is_communication());
    }

    #[tokio::test]
    async fn failed_probe_with_delete_on_fail_deletes() {
        let store = store();
        let sampler = VerificationSampler::new(Arc::clone(&store) as Arc<dyn ArchiveStore>);

        // Listed as standard but stored archived: the probe is rejected.
        let record = sampler
            .verify("vault", &descriptor("cold.bin", StorageClass::Standard), true)
            .await;
        assert!(!record.restorable);
        assert!(record.deleted);
        assert!(record.error.as_deref().unwrap().starts_with("ERR: "));
        assert!(record.delete_error.is_none());
        assert!(!store.contains("vault", "cold.bin"));
    }

    #[tokio::test]
    async fn failed_probe_without_delete_on_fail_keeps_object() {
        let store = store();
        let sampler = VerificationSampler::new(Arc::clone(&store) as Arc<dyn ArchiveStore>);

        let record = sampler
            .verify("vault", &descriptor("cold.bin", StorageClass::Standard), false)
            .await;
        assert!(!record.restorable);
        assert!(!record.deleted);
        assert!(store.contains("vault", "cold.bin"));
    }

    #[test]
    fn record_fields_render_report_columns() {
        let mut record = VerificationRecord::new("k", false);
        record.deleted = true;
        record.error = Some("ERR: boom".into());
        assert_eq!(record.fields(), vec!["k", "false", "Deleted", "ERR: boom", ""]);
    }

    #[tokio::test]
    async fn verify_all_reports_every_object() {
        let sampler = VerificationSampler::new(store());
        let writer = ReportWriter::new(Vec::new(), ReportKind::Verification).unwrap();
        let sink = ReportSink::spawn(writer);

        let objects = vec![
            descriptor("warm.txt", StorageClass::Standard),
            descriptor("cold.bin", StorageClass::Archive),
            descriptor("empty", StorageClass::Standard),
        ];
        let batch = sampler
            .verify_all("vault", objects, false, &FanOut::new(2), &sink.handle())
            .await;
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.success_count(), 3);

        let (buf, rows) = sink.finish().await.unwrap();
        assert_eq!(rows, 3);
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Key,Restorable,Deleted,Error,Delete Error\n"));
        assert!(text.contains("warm.txt,true,,,\n"));
        assert!(text.contains("cold.bin,false,,,\n"));
    }
}
