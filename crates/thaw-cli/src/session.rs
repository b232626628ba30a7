//! Per-invocation session: resolved configuration, store and cancellation.

use std::sync::Arc;

use thaw_core::{ArchiveStore, Error, FanOut, KeySelector, Result, S3Store};
use tokio_util::sync::CancellationToken;

use crate::Config;
use crate::output::{self, Output};

/// Everything an operation needs to run.
pub struct Session {
    config: Config,
    store: Option<Arc<dyn ArchiveStore>>,
    cancel: CancellationToken,
}

impl Session {
    /// Connects to the configured S3 endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the connection settings are invalid.
    pub async fn connect(config: Config) -> Result<Self> {
        let store = S3Store::connect(&config.s3).await?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Uses an existing store.
    #[must_use]
    pub fn with_store(config: Config, store: Arc<dyn ArchiveStore>) -> Self {
        Self {
            config,
            store: Some(store),
            cancel: CancellationToken::new(),
        }
    }

    /// A session without a store, for operations that never touch one.
    #[must_use]
    pub fn offline(config: Config) -> Self {
        Self {
            config,
            store: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token cancelled on Ctrl-C or when the wait deadline passes.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The connected store.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an offline session.
    pub fn store(&self) -> Result<Arc<dyn ArchiveStore>> {
        self.store
            .clone()
            .ok_or_else(|| Error::configuration("operation requires a storage connection"))
    }

    /// The bucket, which must be set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no bucket was given.
    pub fn bucket(&self) -> Result<&str> {
        self.config
            .bucket
            .as_deref()
            .ok_or_else(|| Error::configuration("must specify bucket"))
    }

    /// The key, which must be set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no key was given.
    pub fn key(&self) -> Result<&str> {
        self.config
            .key
            .as_deref()
            .ok_or_else(|| Error::configuration("must specify key"))
    }

    /// Key or prefix selection.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when neither was given.
    pub fn selector(&self) -> Result<KeySelector> {
        KeySelector::from_parts(self.config.key.as_deref(), self.config.prefix.as_deref())
    }

    /// Prefix for listings; empty lists the whole bucket.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.config.prefix.as_deref().unwrap_or_default()
    }

    /// Fan-out sized by `--concurrency` and tied to the session's token.
    #[must_use]
    pub fn fan_out(&self) -> FanOut {
        FanOut::new(self.config.concurrency).with_cancellation(self.cancel.clone())
    }

    /// Opens the report destination.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the output file cannot be created.
    pub fn open_output(&self) -> Result<Output> {
        output::open(self.config.out.as_deref())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("connected", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thaw_core::MemoryStore;

    #[test]
    fn missing_parameters_are_configuration_errors() {
        let session = Session::with_store(Config::default(), Arc::new(MemoryStore::new()));
        assert!(matches!(session.bucket(), Err(Error::Configuration { .. })));
        assert!(matches!(session.key(), Err(Error::Configuration { .. })));
        let err = session.selector().unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: must specify either key or prefix"
        );
        assert_eq!(session.prefix(), "");
    }

    #[test]
    fn offline_session_has_no_store() {
        let session = Session::offline(Config::default());
        assert!(session.store().is_err());
    }

    #[test]
    fn fan_out_follows_concurrency_and_token() {
        let config = Config {
            concurrency: 4,
            ..Config::default()
        };
        let session = Session::offline(config);
        let fan_out = session.fan_out();
        assert_eq!(fan_out.limit(), 4);
        session.cancellation().cancel();
        assert!(fan_out.cancellation().is_cancelled());
    }
}
