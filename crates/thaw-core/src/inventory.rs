//! Paginated object inventory.
//!
//! Every batch operation that needs the full key set up front materializes it
//! here. Listing streams one page at a time for reports that should start
//! writing before the listing finishes.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::object::{BucketDescriptor, KeySelector, ObjectDescriptor};
use crate::store::{ArchiveStore, ObjectPage};

/// Maximum number of objects requested per listing page.
pub const PAGE_SIZE: usize = 100;

/// Lists buckets and objects through an [`ArchiveStore`].
#[derive(Clone)]
pub struct Inventory {
    store: Arc<dyn ArchiveStore>,
}

impl Inventory {
    /// Creates an inventory over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn ArchiveStore>) -> Self {
        Self { store }
    }

    /// Lists every bucket.
    ///
    /// # Errors
    ///
    /// Returns a communication error if the listing fails.
    pub async fn list_buckets(&self) -> Result<Vec<BucketDescriptor>> {
        self.store.list_buckets().await
    }

    /// Fetches one page of at most [`PAGE_SIZE`] objects.
    ///
    /// # Errors
    ///
    /// Returns a communication error if the listing fails.
    pub async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage> {
        self.store
            .list_objects(bucket, prefix, continuation_token, PAGE_SIZE)
            .await
    }

    /// Calls `f` with each page in order until the listing is exhausted.
    ///
    /// Returns the total number of objects seen.
    ///
    /// # Errors
    ///
    /// Returns the first listing error, or the first error returned by `f`.
    pub async fn for_each_page<F>(&self, bucket: &str, prefix: &str, mut f: F) -> Result<usize>
    where
        F: FnMut(&ObjectPage) -> Result<()> + Send,
    {
        let mut token: Option<String> = None;
        let mut total = 0;
        let mut pages = 0usize;
        loop {
            let page = self.list_page(bucket, prefix, token.as_deref()).await?;
            pages += 1;
            total += page.objects.len();
            f(&page)?;
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        tracing::debug!(bucket, prefix, pages, objects = total, "listing complete");
        Ok(total)
    }

    /// Materializes every object under `prefix`, in listing order.
    ///
    /// # Errors
    ///
    /// Returns a communication error if any page fails.
    pub async fn list_all(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectDescriptor>> {
        let mut objects = Vec::new();
        self.for_each_page(bucket, prefix, |page| {
            objects.extend(page.objects.iter().cloned());
            Ok(())
        })
        .await?;
        Ok(objects)
    }

    /// Like [`list_all`](Self::list_all), but an empty result is an error.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when nothing matches.
    pub async fn list_required(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectDescriptor>> {
        let objects = self.list_all(bucket, prefix).await?;
        if objects.is_empty() {
            return Err(Error::configuration(format!(
                "no objects match bucket {bucket} and prefix {prefix}"
            )));
        }
        Ok(objects)
    }

    /// Turns a selector into concrete keys: a key is used as-is, a prefix is
    /// listed and must match at least one object.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty prefix match, or a
    /// communication error if listing fails.
    pub async fn resolve_keys(&self, bucket: &str, selector: &KeySelector) -> Result<Vec<String>> {
        match selector {
            KeySelector::Key(key) => Ok(vec![key.clone()]),
            KeySelector::Prefix(prefix) => Ok(self
                .list_required(bucket, prefix)
                .await?
                .into_iter()
                .map(|o| o.key)
                .collect()),
        }
    }
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inventory").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::StorageClass;
    use crate::store::MemoryStore;

    fn inventory_with(count: usize) -> Inventory {
        let store = MemoryStore::new();
        store.create_bucket("vault").unwrap();
        for i in 0..count {
            store
                .put_object("vault", &format!("logs/{i:04}.gz"), "x", StorageClass::Archive)
                .unwrap();
        }
        store
            .put_object("vault", "other/readme", "x", StorageClass::Standard)
            .unwrap();
        Inventory::new(Arc::new(store))
    }

    #[tokio::test]
    async fn list_all_spans_pages() {
        let inventory = inventory_with(250);
        let mut page_sizes = Vec::new();
        let total = inventory
            .for_each_page("vault", "logs/", |page| {
                page_sizes.push(page.objects.len());
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(total, 250);
        assert_eq!(page_sizes, vec![100, 100, 50]);

        let all = inventory.list_all("vault", "logs/").await.unwrap();
        assert_eq!(all.len(), 250);
        assert_eq!(all[0].key, "logs/0000.gz");
        assert_eq!(all[249].key, "logs/0249.gz");
    }

    #[tokio::test]
    async fn empty_match_is_configuration_error_only_when_required() {
        let inventory = inventory_with(3);
        assert!(inventory.list_all("vault", "missing/").await.unwrap().is_empty());

        let err = inventory
            .list_required("vault", "missing/")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("no objects match bucket vault and prefix missing/"));
    }

    #[tokio::test]
    async fn resolve_keys_uses_key_without_listing() {
        let inventory = inventory_with(3);
        let keys = inventory
            .resolve_keys("vault", &KeySelector::Key("not/listed".into()))
            .await
            .unwrap();
        assert_eq!(keys, vec!["not/listed".to_string()]);

        let keys = inventory
            .resolve_keys("vault", &KeySelector::Prefix("logs/".into()))
            .await
            .unwrap();
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn callback_error_stops_listing() {
        let inventory = inventory_with(150);
        let mut calls = 0;
        let err = inventory
            .for_each_page("vault", "logs/", |_| {
                calls += 1;
                Err(Error::configuration("stop"))
            })
            .await
            .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
