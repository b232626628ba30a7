//! Verification commands - probe objects with a two-byte read.

use anyhow::Result;
use async_trait::async_trait;
use owo_colors::OwoColorize;
use thaw_core::inventory::Inventory;
use thaw_core::report::{ReportKind, ReportSink, ReportWriter};
use thaw_core::verify::VerificationSampler;

use crate::registry::Operation;
use crate::session::Session;

/// Probes a single key.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyByte;

#[async_trait]
impl Operation for VerifyByte {
    fn name(&self) -> &'static str {
        "verify-byte"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["get-object-byte"]
    }

    fn summary(&self) -> &'static str {
        "Read the first two bytes of a key to check it is retrievable"
    }

    async fn run(&self, session: &Session) -> Result<()> {
        let bucket = session.bucket()?;
        let key = session.key()?;
        match VerificationSampler::new(session.store()?).probe(bucket, key).await {
            Ok(_) => {
                println!("{} test restoring {key}", "SUCCESS".green());
                Ok(())
            }
            Err(err) => {
                println!("{} test restoring {key}", "FAILED".red());
                Err(err.into())
            }
        }
    }
}

/// Writes a verification report for every object under a prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestByteRestore;

#[async_trait]
impl Operation for TestByteRestore {
    fn name(&self) -> &'static str {
        "test-byte-restore"
    }

    fn summary(&self) -> &'static str {
        "Probe every object under a prefix and report which are retrievable"
    }

    async fn run(&self, session: &Session) -> Result<()> {
        let bucket = session.bucket()?;
        let prefix = session.prefix();
        let store = session.store()?;
        let objects = Inventory::new(store.clone()).list_all(bucket, prefix).await?;

        let writer = ReportWriter::new(session.open_output()?, ReportKind::Verification)?;
        let sink = ReportSink::spawn(writer);
        let batch = VerificationSampler::new(store)
            .verify_all(
                bucket,
                objects,
                session.config().delete_on_fail,
                &session.fan_out(),
                &sink.handle(),
            )
            .await;
        let (_, rows) = sink.finish().await?;

        let restorable = batch.successes().filter(|(_, r)| r.restorable).count();
        tracing::info!(bucket, prefix, rows, restorable, "verification report written");
        for (key, err) in batch.failures() {
            tracing::warn!(key, error = %err, "verification row not reported");
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

    fn config(key: Option<&str>) -> Config {
        Config {
            bucket: Some("vault".to_string()),
            key: key.map(str::to_string),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn verify_byte_on_readable_object() {
        let store = Arc::new(MemoryStore::new());
        store.put_object("vault", "hot", "hello", StorageClass::Standard).unwrap();
        VerifyByte
            .run(&Session::with_store(config(Some("hot")), store))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn verify_byte_propagates_service_rejection() {
        let store = Arc::new(MemoryStore::new());
        store.put_object("vault", "cold", "hello", StorageClass::Archive).unwrap();
        let err = VerifyByte
            .run(&Session::with_store(config(Some("cold")), store))
            .await
            .unwrap_err();
        let err = err.downcast_ref::<Error>().unwrap();
        assert_eq!(err.code(), Some("InvalidObjectState"));
    }

    #[tokio::test]
    async fn report_covers_every_object() {
        let store = Arc::new(MemoryStore::new());
        store.put_object("vault", "a", "hello", StorageClass::Standard).unwrap();
        store.put_object("vault", "b", "hello", StorageClass::Archive).unwrap();
        store.put_object("vault", "c", "", StorageClass::Standard).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("verify.csv");
        let config = Config {
            out: Some(out.clone()),
            concurrency: 2,
            ..config(None)
        };

        TestByteRestore
            .run(&Session::with_store(config, store))
            .await
            .unwrap();

        let report = std::fs::read_to_string(out).unwrap();
        let mut lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.remove(0), "Key,Restorable,Deleted,Error,Delete Error");
        lines.sort_unstable();
        assert_eq!(lines, vec!["a,true,,,", "b,false,,,", "c,true,,,"]);
    }

    #[tokio::test]
    async fn empty_bucket_writes_header_only() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket("vault").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("verify.csv");
        let config = Config {
            out: Some(out.clone()),
            ..config(None)
        };

        TestByteRestore
            .run(&Session::with_store(config, store))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(out).unwrap(),
            "Key,Restorable,Deleted,Error,Delete Error\n"
        );
    }
}
