//! Logging initialization and span helpers.
//!
//! All engine progress is reported through `tracing`. Logs go to stderr so that
//! tabular reports written to stdout stay machine-readable.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs.
    Json,
    /// Human-readable logs.
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `thaw_core=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        fmt::layer()
                            .with_target(false)
                            .with_writer(std::io::stderr),
                    )
                    .init();
            }
        }
    });
}

/// Creates a span for a bucket-level operation.
#[must_use]
pub fn recall_span(operation: &str, bucket: &str) -> Span {
    tracing::info_span!("thaw", op = operation, bucket = bucket)
}

/// Creates a span for a single key's task.
///
/// [`FanOut`](crate::fanout::FanOut) runs each task inside one of these.
#[must_use]
pub fn key_span(operation: &str, bucket: &str, key: &str) -> Span {
    tracing::info_span!("key", op = operation, bucket = bucket, key = key)
}
