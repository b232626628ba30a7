//! # thaw-core
//!
//! Recall engine for archive-tier object storage.
//!
//! Objects in an archive tier must be recalled before they can be read. This
//! crate drives that lifecycle against any [`ArchiveStore`]:
//!
//! - **Recall**: issue recall requests for a key or every key under a prefix
//! - **Readiness polling**: per-key state machine with a capped Fibonacci backoff
//! - **Fan-out**: bounded concurrent per-key work with partial-failure aggregation
//! - **Retrieval**: stream recalled objects to local files
//! - **Verification**: probe objects with a two-byte read, optionally deleting failures
//! - **Reports**: CSV bucket listings, inventories and verification reports
//!
//! ## Batch policy
//!
//! Every batch operation collects one outcome per key and succeeds when at
//! least one key succeeded. Individual failures are logged, never escalated.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use thaw_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> thaw_core::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! store.put_object("vault", "logs/2024.gz", "payload", StorageClass::Archive)?;
//!
//! let dir = std::env::temp_dir();
//! let workflow = RecallWorkflow::new(store, &dir);
//! let report = workflow
//!     .run(
//!         "vault",
//!         &KeySelector::Key("logs/2024.gz".into()),
//!         &WorkflowOptions::default(),
//!     )
//!     .await?;
//! assert!(report.ready.overall_success());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod backoff;
pub mod error;
pub mod fanout;
pub mod inventory;
pub mod object;
pub mod observability;
pub mod poller;
pub mod recall;
pub mod report;
pub mod retrieval;
pub mod store;
pub mod verify;
pub mod workflow;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use thaw_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backoff::{FibonacciBackoff, MAX_INTERVAL};
    pub use crate::error::{Error, Result};
    pub use crate::fanout::{BatchResult, FanOut, KeyOutcome};
    pub use crate::inventory::Inventory;
    pub use crate::object::{
        BucketDescriptor, KeySelector, ObjectDescriptor, ObjectStatus, RestoreStatus,
        StorageClass,
    };
    pub use crate::poller::{PollReport, ReadinessPoller};
    pub use crate::recall::RecallCoordinator;
    pub use crate::report::{ReportKind, ReportRow, ReportSink, ReportWriter};
    pub use crate::retrieval::{FetchedArtifact, RetrievalManager};
    pub use crate::store::{ArchiveStore, MemoryStore, S3Config, S3Store};
    pub use crate::verify::{VerificationRecord, VerificationSampler};
    pub use crate::workflow::{RecallWorkflow, WorkflowOptions, WorkflowReport};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use fanout::{BatchResult, FanOut, KeyOutcome};
pub use object::{BucketDescriptor, KeySelector, ObjectDescriptor, StorageClass};
pub use observability::{LogFormat, init_logging};
pub use store::{ArchiveStore, MemoryStore, S3Config, S3Store};
