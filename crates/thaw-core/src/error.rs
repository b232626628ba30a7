//! Error types and result aliases for thaw.
//!
//! Errors are structured for programmatic handling. Service failures carry the
//! service error code (when the service supplied one) so the CLI can decode it
//! into a friendly label before printing.

use std::path::{Path, PathBuf};

/// The result type used throughout thaw.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in thaw operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The storage service could not be reached or rejected the request.
    #[error("{operation} failed for {target}: {message}")]
    Communication {
        /// Store operation that failed (e.g. `head_object`).
        operation: &'static str,
        /// `bucket/key` (or bucket) the operation addressed.
        target: String,
        /// Service error code, when the service returned one.
        code: Option<String>,
        /// Human-readable description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing or invalid selection, or a selection that matched nothing.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// A batch completed without a single successful key.
    #[error("{}", no_success_message(operation))]
    NoSuccess {
        /// Batch operation (`restore`, `wait`, `fetch`, ...).
        operation: &'static str,
        /// Number of keys that were attempted.
        attempted: usize,
    },

    /// The command selector does not name a registered operation.
    #[error("unsupported command: '{name}'")]
    UnsupportedOperation {
        /// The selector that was given.
        name: String,
    },

    /// A local filesystem operation failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Work on a key stopped because the caller cancelled it or its deadline passed.
    #[error("cancelled while processing '{key}'")]
    Cancelled {
        /// Key whose workflow was interrupted.
        key: String,
    },

    /// A per-key task panicked.
    #[error("task for '{key}' panicked: {message}")]
    TaskPanicked {
        /// Key the task was processing.
        key: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// Writing a report row failed.
    #[error("report error: {message}")]
    Report {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

fn no_success_message(operation: &str) -> String {
    match operation {
        "restore" => "no successful restore commands".to_string(),
        "wait" => "no matching objects ready for restoration".to_string(),
        other => format!("no successful {other} operations"),
    }
}

/// Service error codes with a friendly label.
const KNOWN_CODES: &[(&str, &str)] = &[
    ("NoSuchKey", "Object not found"),
    ("NotFound", "Object not found"),
    ("NoSuchBucket", "Bucket not found"),
    ("InvalidObjectState", "Object is archived and has not been restored"),
    ("RestoreAlreadyInProgress", "A restore is already in progress"),
    ("AccessDenied", "Access denied"),
    ("InvalidAccessKeyId", "Unknown access key"),
    ("SignatureDoesNotMatch", "Credentials rejected"),
    ("ServiceUnavailable", "Service unavailable"),
    ("SlowDown", "Request rate too high"),
    (
        "GlacierExpeditedRetrievalNotAvailable",
        "Expedited retrieval not available",
    ),
    ("InvalidArgument", "Invalid parameter value"),
    ("MissingParameter", "Missing parameter value"),
];

impl Error {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a communication error without a service code or source.
    #[must_use]
    pub fn communication(
        operation: &'static str,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Communication {
            operation,
            target: target.into(),
            code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a communication error carrying a service error code.
    #[must_use]
    pub fn service(
        operation: &'static str,
        target: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Communication {
            operation,
            target: target.into(),
            code: Some(code.into()),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an I/O error for the given path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns the service error code, if this error carries one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Communication { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Returns the friendly label for a recognized service error code.
    #[must_use]
    pub fn friendly_label(&self) -> Option<&'static str> {
        let code = self.code()?;
        KNOWN_CODES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, label)| *label)
    }

    /// Renders the error for the user.
    ///
    /// Recognized service codes are prefixed with their label and code; anything
    /// else prints the raw message.
    #[must_use]
    pub fn describe(&self) -> String {
        match (self.friendly_label(), self.code()) {
            (Some(label), Some(code)) => format!("{label} ({code}): {self}"),
            _ => self.to_string(),
        }
    }

    /// Returns true for transport/service failures.
    #[must_use]
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_code_is_decoded() {
        let err = Error::service("get_object", "b/k", "NoSuchKey", "The key does not exist");
        assert_eq!(err.code(), Some("NoSuchKey"));
        assert_eq!(err.friendly_label(), Some("Object not found"));
        assert!(err.describe().starts_with("Object not found (NoSuchKey): "));
    }

    #[test]
    fn unknown_code_prints_raw_message() {
        let err = Error::service("get_object", "b/k", "Teapot", "short and stout");
        assert_eq!(err.friendly_label(), None);
        assert_eq!(err.describe(), err.to_string());
        assert!(err.describe().contains("short and stout"));
    }

    #[test]
    fn no_success_messages_match_operation() {
        let restore = Error::NoSuccess {
            operation: "restore",
            attempted: 3,
        };
        assert_eq!(restore.to_string(), "no successful restore commands");

        let wait = Error::NoSuccess {
            operation: "wait",
            attempted: 3,
        };
        assert_eq!(wait.to_string(), "no matching objects ready for restoration");

        let fetch = Error::NoSuccess {
            operation: "fetch",
            attempted: 1,
        };
        assert_eq!(fetch.to_string(), "no successful fetch operations");
    }

    #[test]
    fn only_communication_errors_carry_codes() {
        let err = Error::configuration("missing key");
        assert!(err.code().is_none());
        assert!(!err.is_communication());
    }
}
