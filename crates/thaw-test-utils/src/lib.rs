//! Shared test utilities for thaw integration tests.
//!
//! This crate provides:
//! - [`TracingStore`]: an [`ArchiveStore`](thaw_core::ArchiveStore) wrapper that
//!   records operations, injects faults and measures concurrency
//! - [`TestContext`]: a seeded store plus a scratch download directory
//!
//! # Example
//!
//! ```rust,ignore
//! use thaw_test_utils::TestContext;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new().archived("logs/a.gz", "payload");
//!     // ... run against ctx.store() ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;
pub mod store;

pub use fixtures::*;
pub use store::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("thaw_core=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
